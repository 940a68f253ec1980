use std::sync::LazyLock;

use regex::Regex;

static REMOTE_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(http://|https://|ftp://)").expect("valid scheme pattern"));
static SRA_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SRR\d+$").expect("valid accession pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Already hosted elsewhere; passed to the server untouched.
    Remote,
    /// A path on this machine that has to be uploaded.
    Local,
}

pub fn classify(value: &str) -> LinkKind {
    let value = value.trim();
    if REMOTE_SCHEME.is_match(value) || SRA_RUN.is_match(value) {
        LinkKind::Remote
    } else {
        LinkKind::Local
    }
}

pub fn is_remote(value: &str) -> bool {
    classify(value) == LinkKind::Remote
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_remote() {
        assert_eq!(classify("https://x.org/f.fq.gz"), LinkKind::Remote);
        assert_eq!(classify("http://x.org/f.fq.gz"), LinkKind::Remote);
        assert_eq!(classify("ftp://host/f"), LinkKind::Remote);
    }

    #[test]
    fn accessions_are_remote_only_when_exact() {
        assert_eq!(classify("SRR123456"), LinkKind::Remote);
        assert_eq!(classify("srr123"), LinkKind::Local);
        assert_eq!(classify("SRR123.fastq"), LinkKind::Local);
        assert_eq!(classify("xSRR123"), LinkKind::Local);
        assert_eq!(classify("SRR"), LinkKind::Local);
    }

    #[test]
    fn paths_are_local() {
        assert_eq!(classify("/data/sample1_R1.fastq.gz"), LinkKind::Local);
        assert_eq!(classify("HTTPS://x.org/f"), LinkKind::Local);
        assert_eq!(classify("reads/https://odd"), LinkKind::Local);
    }
}
