//! CSV record source.
//!
//! The document starts with a fixed header naming five positional columns:
//!
//! ```text
//! uniqueid,name,amenity,building,latlng
//! shop-17,Corner Cafe,cafe,,"51.501,-0.141"
//! shop-18,Old Bakery,,retail,
//! ```
//!
//! The position may also be written unquoted (`shop-19,Kiosk,,,51.5,-0.14`):
//! every field from the fifth onward is joined back into `latlng`.
//!
//! The whole document is validated before any record is returned, so a bad
//! row never leads to a partial upload.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::error::{source_io_err, SourceError};
use crate::types::{Position, Record, UniqueId};

/// Expected header, compared case-insensitively.
pub const HEADER: [&str; 5] = ["uniqueid", "name", "amenity", "building", "latlng"];

const UID: usize = 0;
const NAME: usize = 1;
const AMENITY: usize = 2;
const BUILDING: usize = 3;
const LATLNG: usize = 4;

/// Read every record from the CSV file at `path`, in document order.
pub fn read_records(path: &Path) -> Result<Vec<Record>, SourceError> {
    let file = std::fs::File::open(path).map_err(|e| source_io_err(path, e))?;
    parse_records(file)
}

/// Parse records from any CSV reader.
pub fn parse_records<R: Read>(reader: R) -> Result<Vec<Record>, SourceError> {
    let mut csv = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    check_header(csv.headers()?)?;

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for row in csv.records() {
        let row = row?;
        let line = row.position().map_or(0, |p| p.line());
        if row.len() < HEADER.len() {
            return Err(SourceError::MissingColumns {
                line,
                found: row.len(),
            });
        }
        let record = to_record(&row);

        if record.unique_id.0.is_empty() {
            return Err(SourceError::EmptyUniqueId { line });
        }
        if !seen.insert(record.unique_id.clone()) {
            return Err(SourceError::DuplicateUniqueId {
                id: record.unique_id.0,
                line,
            });
        }
        if !record.position.is_empty() {
            if let Err(source) = record.position.coordinates() {
                return Err(SourceError::InvalidPosition {
                    id: record.unique_id.0,
                    line,
                    source,
                });
            }
        }
        records.push(record);
    }
    Ok(records)
}

fn check_header(header: &StringRecord) -> Result<(), SourceError> {
    let normalized: Vec<String> = header
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();
    if normalized != HEADER {
        return Err(SourceError::InvalidHeader {
            found: header.iter().collect::<Vec<_>>().join(","),
        });
    }
    Ok(())
}

fn to_record(row: &StringRecord) -> Record {
    let field = |i: usize| row.get(i).unwrap_or_default().to_string();
    Record {
        unique_id: UniqueId(field(UID)),
        name: field(NAME),
        amenity: field(AMENITY),
        building: field(BUILDING),
        position: Position(row.iter().skip(LATLNG).collect::<Vec<_>>().join(",")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PositionError;

    fn parse(doc: &str) -> Result<Vec<Record>, SourceError> {
        parse_records(doc.as_bytes())
    }

    #[test]
    fn parses_rows_in_document_order() {
        let records = parse(
            "uniqueid,name,amenity,building,latlng\n\
             B,Y,cafe,,\"2,2\"\n\
             A,X,,,\n",
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].unique_id, UniqueId::from("B"));
        assert_eq!(records[0].amenity, "cafe");
        assert_eq!(records[0].position, Position::from("2,2"));
        assert_eq!(records[1].unique_id, UniqueId::from("A"));
        assert!(records[1].position.is_empty());
    }

    #[test]
    fn header_is_case_insensitive() {
        let records = parse("UniqueID, Name ,AMENITY,Building,LatLng\nA,X,,,\n").unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn wrong_header_is_rejected() {
        let err = parse("id,name,amenity,building,latlng\nA,X,,,\n").unwrap_err();
        assert!(matches!(err, SourceError::InvalidHeader { .. }));
    }

    #[test]
    fn empty_document_is_rejected() {
        assert!(matches!(
            parse("").unwrap_err(),
            SourceError::InvalidHeader { .. }
        ));
    }

    #[test]
    fn unquoted_pair_is_joined_into_position() {
        let records = parse("uniqueid,name,amenity,building,latlng\nA,X,,,\nB,Y,cafe,,2,2\n").unwrap();
        assert!(records[0].position.is_empty());
        assert_eq!(records[1].position, Position::from("2,2"));
        assert_eq!(records[1].amenity, "cafe");
    }

    #[test]
    fn short_row_reports_missing_columns() {
        let err = parse("uniqueid,name,amenity,building,latlng\nA,X,,\n").unwrap_err();
        assert!(matches!(err, SourceError::MissingColumns { line: 2, found: 4 }));
    }

    #[test]
    fn extra_fields_beyond_a_pair_are_malformed() {
        let err = parse("uniqueid,name,amenity,building,latlng\nA,X,,,1,2,3\n").unwrap_err();
        assert!(matches!(err, SourceError::InvalidPosition { line: 2, .. }));
    }

    #[test]
    fn duplicate_and_empty_ids_are_rejected() {
        let dup = parse("uniqueid,name,amenity,building,latlng\nA,X,,,\nA,Y,,,\n").unwrap_err();
        assert!(matches!(dup, SourceError::DuplicateUniqueId { line: 3, .. }));

        let empty = parse("uniqueid,name,amenity,building,latlng\n,X,,,\n").unwrap_err();
        assert!(matches!(empty, SourceError::EmptyUniqueId { line: 2 }));
    }

    #[test]
    fn malformed_position_is_rejected() {
        let err = parse("uniqueid,name,amenity,building,latlng\nA,X,,,somewhere\n").unwrap_err();
        assert!(matches!(
            err,
            SourceError::InvalidPosition {
                source: PositionError::Malformed(_),
                ..
            }
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_records(Path::new("/nonexistent/places.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/places.csv"));
    }
}
