//! Ledger export fixtures: CSV content and ZIP archives

use std::io::{Cursor, Write};

/// Full SK.csv header, payment columns included
pub const SK_HEADER: &str = "POLOZKA;CASTKA_DAL;CASTKA_MD;ORGANIZACE;ORGANIZACE_NAZEV;DOKLAD_AGENDA;PARAGRAF;DOKLAD_DATUM;SUBJEKT_IC;SUBJEKT_NAZEV;POZNAMKA";

/// RU.csv header (no category, no payment columns)
pub const RU_HEADER: &str = "POLOZKA;CASTKA_DAL;CASTKA_MD;ORGANIZACE;ORGANIZACE_NAZEV;PARAGRAF";

/// Journal with one plain row, one supplier invoice and one income row
///
/// Events: Organization, Balance, Balance, Payment, Organization, Balance
pub const SAMPLE_SK: &str = "POLOZKA;CASTKA_DAL;CASTKA_MD;ORGANIZACE;ORGANIZACE_NAZEV;DOKLAD_AGENDA;PARAGRAF;DOKLAD_DATUM;SUBJEKT_IC;SUBJEKT_NAZEV;POZNAMKA
5139;0;250.50;10;Radnice;ZAV;6171;;;;
5169;0;1210;;;KDF;6171;2024-03-01;12345678;ACME s.r.o.;faktura 17
6000;100;40;20;Skola;ZAV;3113;;;;
";

/// Budget with two rows
///
/// Events: Balance, Balance
pub const SAMPLE_RU: &str = "POLOZKA;CASTKA_DAL;CASTKA_MD;ORGANIZACE;ORGANIZACE_NAZEV;PARAGRAF
1111;500;0;;;0000
5169;0;300;;;6171
";

/// Number of data rows in [`SAMPLE_SK`] and [`SAMPLE_RU`]
pub const SAMPLE_ROWS: u64 = 5;

/// Number of events produced by [`SAMPLE_SK`] and [`SAMPLE_RU`]
pub const SAMPLE_EVENTS: usize = 8;

/// Build an in-memory ZIP archive from (name, content) pairs
pub fn zip_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Archive holding [`SAMPLE_SK`] and [`SAMPLE_RU`]
pub fn sample_archive() -> Vec<u8> {
    zip_archive(&[("SK.csv", SAMPLE_SK), ("RU.csv", SAMPLE_RU)])
}
