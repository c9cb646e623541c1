//! Bank and sample identifiers embedded in sequencing filenames.
//!
//! Vendor filenames look like `TB7217_S3_R1_001.fastq.gz`: a bank token
//! (`TB` + digits) and a sample-number token (`S` + digits) somewhere among
//! the `_`/`-`/`.` separated tokens. Matching is case-insensitive and the
//! extracted identifiers are uppercased.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::Identifiers;

static BANK_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^TB\d+$").expect("bank token pattern"));
static SAMPLE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^S\d+$").expect("sample token pattern"));

/// Never fails: filenames outside the convention yield `Identifiers::Absent`.
pub fn extract(filename: &str) -> Identifiers {
    let tokens = tokenize(filename).collect::<Vec<_>>();

    let Some(bank_pos) = tokens.iter().position(|token| BANK_TOKEN.is_match(token)) else {
        return Identifiers::Absent;
    };
    let sample = tokens
        .iter()
        .enumerate()
        .find(|(pos, token)| *pos != bank_pos && SAMPLE_TOKEN.is_match(token));

    match sample {
        Some((_, sample)) => Identifiers::Present {
            bank_id: tokens[bank_pos].to_uppercase(),
            sample_id: sample.to_uppercase(),
        },
        None => Identifiers::Absent,
    }
}

fn tokenize(filename: &str) -> impl Iterator<Item = &str> {
    filename
        .split(|ch: char| matches!(ch, '_' | '-' | '.') || ch.is_whitespace())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bank_and_sample() {
        let ids = extract("TB7217_S3_R1.fastq.gz");
        assert_eq!(
            ids,
            Identifiers::Present {
                bank_id: "TB7217".to_string(),
                sample_id: "S3".to_string(),
            }
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let ids = extract("tb0042-s12-L001.bam");
        assert_eq!(ids.bank_id(), Some("TB0042"));
        assert_eq!(ids.sample_id(), Some("S12"));
    }

    #[test]
    fn sample_may_precede_bank() {
        let ids = extract("run7_S5_TB9001.vcf");
        assert_eq!(ids.bank_id(), Some("TB9001"));
        assert_eq!(ids.sample_id(), Some("S5"));
    }

    #[test]
    fn bank_without_sample_is_absent() {
        assert_eq!(extract("TB7217_R1.fastq.gz"), Identifiers::Absent);
    }

    #[test]
    fn unmatched_names_are_absent() {
        assert_eq!(extract("readme.txt"), Identifiers::Absent);
        assert_eq!(extract(""), Identifiers::Absent);
        assert_eq!(extract("TBX_S3.txt"), Identifiers::Absent);
        assert_eq!(extract("xTB7217_S3.txt"), Identifiers::Absent);
    }
}
