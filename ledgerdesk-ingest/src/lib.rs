//! ledgerdesk-ingest: bank statement PDF text extraction and line parsing.

pub mod amount;
pub mod error;
pub mod parsers;
pub mod pdf_text;
pub mod period;
pub mod types;

pub use error::{ErrorKind, IngestError};
pub use parsers::{StatementLayout, parse_statement_text};
pub use pdf_text::{Extractor, extract_content_stream_text};
pub use period::StatementPeriod;
pub use types::{
    BalanceCheck, ParseReport, ParseResult, ReportMetadata, StatementMetadata,
    StatementTransaction, Totals,
};

/// Extract text from PDF bytes and parse it.
///
/// Extraction is infallible; an unreadable document surfaces as
/// `IngestError::NoTransactions` from the parser.
pub fn parse_statement_pdf(
    pdf: &[u8],
    extractor: Extractor,
    layout: &StatementLayout,
    currency: Option<&str>,
) -> Result<ParseResult, IngestError> {
    if pdf.is_empty() {
        return Err(IngestError::MissingInput("statement file"));
    }
    let text = extractor.extract(pdf);
    tracing::debug!(chars = text.len(), ?extractor, "extracted statement text");
    parse_statement_text(&text, layout, currency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_structural() {
        let err = parse_statement_pdf(&[], Extractor::Auto, &StatementLayout::default(), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn uncompressed_pdf_parses_through_content_stream() {
        let stream = "BT (PERIODE : NOVEMBER 2025) Tj ET\n\
                      BT (SALDO AWAL : 1,000,000) Tj ET\n\
                      BT (05/11) Tj (KLIRING PT FARMA) Tj (0123) Tj (250,000) Tj (DB) Tj (750,000) Tj ET\n\
                      BT (SALDO AKHIR : 750,000) Tj ET";
        let pdf = format!("%PDF-1.4\n1 0 obj << >>\nstream\n{stream}\nendstream\nendobj\n%%EOF\n");
        let res = parse_statement_pdf(
            pdf.as_bytes(),
            Extractor::ContentStream,
            &StatementLayout::default(),
            None,
        )
        .unwrap();
        assert_eq!(res.transaction_count(), 1);
        assert_eq!(res.transactions[0].description, "KLIRING PT FARMA");
        assert_eq!(res.transactions[0].branch_code, "0123");
        assert!(res.balance_check().is_balanced());
    }

    #[test]
    fn unreadable_pdf_reports_no_transactions() {
        let err = parse_statement_pdf(
            b"%PDF-1.7 compressed garbage",
            Extractor::ContentStream,
            &StatementLayout::default(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Extraction);
    }
}
