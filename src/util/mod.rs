pub mod asn1;
pub mod binary;
pub mod cryptoutil;
