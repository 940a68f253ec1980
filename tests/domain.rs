use clap::ValueEnum;

use crema_upload::domain::{DataType, Organism, SessionId};
use crema_upload::link::{LinkKind, classify};

#[test]
fn classify_manifest_values() {
    assert_eq!(classify("https://x.org/f.fq.gz"), LinkKind::Remote);
    assert_eq!(classify("SRR123456"), LinkKind::Remote);
    assert_eq!(classify("srr123"), LinkKind::Local);
    assert_eq!(classify("/data/sample1_R1.fastq.gz"), LinkKind::Local);
    assert_eq!(classify("ftp://host/f"), LinkKind::Remote);
    assert_eq!(classify("  SRR42 "), LinkKind::Remote);
}

#[test]
fn cli_value_names_match_wire_values() {
    for data_type in DataType::value_variants() {
        let name = data_type.to_possible_value().unwrap();
        assert_eq!(name.get_name(), data_type.as_str());
    }
    for organism in Organism::value_variants() {
        let name = organism.to_possible_value().unwrap();
        assert_eq!(name.get_name(), organism.as_str());
    }
}

#[test]
fn session_id_handles_crlf() {
    let id: SessionId = "tmp_8f2c\r\n".parse().unwrap();
    assert_eq!(id.as_str(), "tmp_8f2c");
}
