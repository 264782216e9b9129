use super::{Backend, StatusTable, Value, VersionDetectionError};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use tracing::{debug, instrument};

/// Status tables that only exist from this release onward are gated on it.
pub const VERSION_4_2: Version = Version::new(4, 2, 0);

#[allow(clippy::expect_used)]
static VERSION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((\d+)(\.\d+)(\.\d+)?)").expect("valid pool_version regex"));

/// Runs `SHOW pool_version` and parses the answer.
///
/// # Errors
///
/// Returns an error if the query fails or its result is not a recognizable version.
#[instrument(skip(backend), level = "debug", err)]
pub async fn detect(backend: &dyn Backend) -> Result<Version, VersionDetectionError> {
    debug!("querying Pgpool-II version");

    let table = backend
        .show("pool_version")
        .await
        .map_err(VersionDetectionError::Query)?;

    from_table(&table)
}

/// Extracts the version from a `SHOW pool_version` result.
///
/// # Errors
///
/// Returns an error unless the table has at least one row, exactly one
/// `pool_version` column and a last row starting with a dotted version number.
pub fn from_table(table: &StatusTable) -> Result<Version, VersionDetectionError> {
    // Columns are taken from the first row, so an empty result has none.
    if table.rows.is_empty() {
        return Err(VersionDetectionError::Empty);
    }

    if table.columns.len() != 1 || table.columns.first().map(String::as_str) != Some("pool_version")
    {
        return Err(VersionDetectionError::UnexpectedColumns(
            table.columns.clone(),
        ));
    }

    let text = match table.rows.last().and_then(|row| row.get("pool_version")) {
        Some(Value::Text(text)) => text.clone(),
        Some(Value::Bytes(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
        Some(other) => return Err(VersionDetectionError::Unparseable(format!("{other:?}"))),
        None => return Err(VersionDetectionError::Empty),
    };

    parse(&text).ok_or(VersionDetectionError::Unparseable(text))
}

/// Parses the leading `major.minor[.patch]` of a Pgpool-II version string.
/// A missing patch component is read as 0.
#[must_use]
pub fn parse(text: &str) -> Option<Version> {
    let captures = VERSION_REGEX.captures(text)?;

    let major = captures.get(2)?.as_str().parse().ok()?;
    let minor = captures.get(3)?.as_str().trim_start_matches('.').parse().ok()?;
    let patch = match captures.get(4) {
        Some(m) => m.as_str().trim_start_matches('.').parse().ok()?,
        None => 0,
    };

    let version = Version::new(major, minor, patch);
    debug!(pgpool_version = %version, "parsed Pgpool-II version");
    Some(version)
}

/// Whether a table introduced in `since` may be queried on `detected`.
/// Unknown versions only pass ungated tables.
#[must_use]
pub fn is_supported(since: Option<&Version>, detected: Option<&Version>) -> bool {
    match (since, detected) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(since), Some(detected)) => detected >= since,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pgpool::RawRow;

    fn version_table(column: &str, value: &str) -> StatusTable {
        StatusTable::from_rows(vec![[(column, value)].into_iter().collect::<RawRow>()])
    }

    #[test]
    fn test_parse_full_version_with_codename() {
        assert_eq!(
            parse("4.2.1 (chichiriboshi)"),
            Some(Version::new(4, 2, 1))
        );
    }

    #[test]
    fn test_parse_without_patch() {
        assert_eq!(parse("4.3 (tamahomeboshi)"), Some(Version::new(4, 3, 0)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse("pgpool"), None);
        assert_eq!(parse("4"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn test_from_table() {
        let table = version_table("pool_version", "4.1.4 (karasukiboshi)");
        assert_eq!(from_table(&table).unwrap(), Version::new(4, 1, 4));
    }

    #[test]
    fn test_from_table_wrong_column() {
        let table = version_table("version", "4.1.4");
        assert!(matches!(
            from_table(&table),
            Err(VersionDetectionError::UnexpectedColumns(_))
        ));
    }

    #[test]
    fn test_from_table_no_rows() {
        let table = StatusTable {
            columns: vec!["pool_version".to_string()],
            rows: Vec::new(),
        };
        assert!(matches!(from_table(&table), Err(VersionDetectionError::Empty)));
    }

    #[test]
    fn test_from_table_empty_result() {
        assert!(matches!(
            from_table(&StatusTable::default()),
            Err(VersionDetectionError::Empty)
        ));
    }

    #[test]
    fn test_from_table_unparseable() {
        let table = version_table("pool_version", "unknown");
        assert!(matches!(
            from_table(&table),
            Err(VersionDetectionError::Unparseable(_))
        ));
    }

    #[test]
    fn test_gate() {
        let v41 = Version::new(4, 1, 0);
        let v42 = Version::new(4, 2, 0);
        let v43 = Version::new(4, 3, 2);

        assert!(!is_supported(Some(&VERSION_4_2), Some(&v41)));
        assert!(is_supported(Some(&VERSION_4_2), Some(&v42)));
        assert!(is_supported(Some(&VERSION_4_2), Some(&v43)));
        assert!(!is_supported(Some(&VERSION_4_2), None));
        assert!(is_supported(None, None));
        assert!(is_supported(None, Some(&v41)));
    }
}
