//! # League Catalog
//!
//! Serves hand-curated league lists from disk. Files are JSON arrays of loosely
//! typed league objects; every record goes through [`normalize`], which either
//! accepts it as a typed [`LeagueRecord`] or drops it with a reason.
//!
//! ## Source Order
//! 1. `<data_dir>/leagues_<season>.json`
//! 2. `<data_dir>/leagues.json`
//!
//! The first source that yields at least one accepted record wins.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::core::config::ReferenceConfig;
use crate::core::error::{GatewayError, GatewayResult};

const FALLBACK_FILE: &str = "leagues.json";

const SAUDI_COUNTRIES: [&str; 2] = ["Saudi-Arabia", "Saudi Arabia"];
const SAUDI_AMBIGUOUS_NAME: &str = "Pro League";
const SAUDI_CURATED_NAME: &str = "Saudi Pro League";

/// One curated league entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueRecord {
    pub id: i64,
    pub name: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl LeagueRecord {
    fn sort_key(&self) -> (&str, &str, &str) {
        (
            self.country.as_deref().unwrap_or(""),
            self.kind.as_deref().unwrap_or(""),
            self.name.as_deref().unwrap_or(""),
        )
    }
}

/// Why a raw entry was left out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotAnObject,
    MissingId,
    InvalidId,
}

/// Outcome of normalizing one raw entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Accept(LeagueRecord),
    Drop(DropReason),
}

/// Coerce a raw `id` into an integer
///
/// Integers, integral floats and integer strings (after trimming) are accepted.
pub fn coerce_id(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn string_field(entry: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    entry.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Turn one raw JSON value into a record, or say why it cannot be one
pub fn normalize(raw: &Value) -> Normalized {
    let Some(entry) = raw.as_object() else {
        return Normalized::Drop(DropReason::NotAnObject);
    };

    let id = match entry.get("id") {
        None | Some(Value::Null) => return Normalized::Drop(DropReason::MissingId),
        Some(raw_id) => match coerce_id(raw_id) {
            Some(id) => id,
            None => return Normalized::Drop(DropReason::InvalidId),
        },
    };

    Normalized::Accept(LeagueRecord {
        id,
        name: string_field(entry, "name"),
        country: string_field(entry, "country"),
        kind: string_field(entry, "type"),
    })
}

/// Upstream lists the Saudi top flight as a bare "Pro League"
pub fn apply_curation(record: &mut LeagueRecord) {
    let saudi = record
        .country
        .as_deref()
        .is_some_and(|country| SAUDI_COUNTRIES.contains(&country));

    if saudi && record.name.as_deref() == Some(SAUDI_AMBIGUOUS_NAME) {
        record.name = Some(SAUDI_CURATED_NAME.to_string());
    }
}

/// A season is exactly four ASCII digits
pub fn validate_season(season: &str) -> GatewayResult<()> {
    if season.len() == 4 && season.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(GatewayError::BadSeasonFormat {
            season: season.to_string(),
        })
    }
}

/// Normalize, curate and sort a parsed file
fn curate(entries: &[Value]) -> Vec<LeagueRecord> {
    let mut records = Vec::with_capacity(entries.len());
    let mut dropped = 0usize;

    for raw in entries {
        match normalize(raw) {
            Normalized::Accept(mut record) => {
                apply_curation(&mut record);
                records.push(record);
            }
            Normalized::Drop(reason) => {
                dropped += 1;
                debug!(reason = ?reason, "Dropped league entry");
            }
        }
    }

    if dropped > 0 {
        debug!(dropped, accepted = records.len(), "Normalized league file");
    }

    records.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    records
}

type CachedSeason = Arc<OnceCell<Arc<Vec<LeagueRecord>>>>;

/// Read-only view over the curated data directory
pub struct LeagueCatalog {
    data_dir: PathBuf,

    /// Present when caching is enabled; one cell per season
    cache: Option<DashMap<String, CachedSeason>>,
}

impl LeagueCatalog {
    pub fn new(config: &ReferenceConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            cache: config.cache_enabled.then(DashMap::new),
        }
    }

    /// Curated leagues for a season, falling back to the undated snapshot
    pub async fn list_leagues(&self, season: &str) -> GatewayResult<Vec<LeagueRecord>> {
        validate_season(season)?;

        let Some(cache) = &self.cache else {
            return self.load(season).await;
        };

        let cell = cache
            .entry(season.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        // A failed init leaves the cell empty, so a later call retries
        let records = cell
            .get_or_try_init(|| async { self.load(season).await.map(Arc::new) })
            .await?;

        Ok(records.as_ref().clone())
    }

    async fn load(&self, season: &str) -> GatewayResult<Vec<LeagueRecord>> {
        let sources = [
            self.data_dir.join(format!("leagues_{}.json", season)),
            self.data_dir.join(FALLBACK_FILE),
        ];

        for path in &sources {
            let Some(entries) = read_source(path).await? else {
                continue;
            };

            let records = curate(&entries);
            if records.is_empty() {
                warn!(path = %path.display(), "League file has no usable records, trying next source");
                continue;
            }

            info!(
                season,
                path = %path.display(),
                leagues = records.len(),
                "Loaded curated leagues"
            );
            return Ok(records);
        }

        Err(GatewayError::ReferenceNotFound {
            season: season.to_string(),
        })
    }
}

/// Read a source file as a JSON array
///
/// `Ok(None)` means the source is unusable: missing, malformed, or not an array.
async fn read_source(path: &Path) -> GatewayResult<Option<Vec<Value>>> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "League file not present");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice::<Value>(&content) {
        Ok(Value::Array(entries)) => Ok(Some(entries)),
        Ok(_) => {
            warn!(path = %path.display(), "League file is not a JSON array, ignoring");
            Ok(None)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "League file is not valid JSON, ignoring");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn catalog(dir: &TempDir, cache_enabled: bool) -> LeagueCatalog {
        LeagueCatalog::new(&ReferenceConfig {
            data_dir: dir.path().to_path_buf(),
            cache_enabled,
            require_auth: true,
        })
    }

    fn write(dir: &TempDir, name: &str, content: &str) {
        std::fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_coerce_id() {
        assert_eq!(coerce_id(&json!(39)), Some(39));
        assert_eq!(coerce_id(&json!(39.0)), Some(39));
        assert_eq!(coerce_id(&json!(" 140 ")), Some(140));
        assert_eq!(coerce_id(&json!(39.5)), None);
        assert_eq!(coerce_id(&json!("abc")), None);
        assert_eq!(coerce_id(&json!("")), None);
        assert_eq!(coerce_id(&json!(true)), None);
        assert_eq!(coerce_id(&json!([39])), None);
    }

    #[test]
    fn test_normalize_outcomes() {
        assert_eq!(normalize(&json!("league")), Normalized::Drop(DropReason::NotAnObject));
        assert_eq!(normalize(&json!({"name": "Serie A"})), Normalized::Drop(DropReason::MissingId));
        assert_eq!(normalize(&json!({"id": null})), Normalized::Drop(DropReason::MissingId));
        assert_eq!(normalize(&json!({"id": "x"})), Normalized::Drop(DropReason::InvalidId));

        assert_eq!(
            normalize(&json!({"id": "135", "name": "Serie A", "country": "Italy", "type": 7})),
            Normalized::Accept(LeagueRecord {
                id: 135,
                name: Some("Serie A".into()),
                country: Some("Italy".into()),
                kind: None,
            })
        );
        assert_eq!(
            normalize(&json!({"id": 2, "name": ["UCL"], "country": {"code": "EU"}, "type": "Cup"})),
            Normalized::Accept(LeagueRecord {
                id: 2,
                name: None,
                country: None,
                kind: Some("Cup".into()),
            })
        );
    }

    #[test]
    fn test_saudi_rename() {
        for country in ["Saudi-Arabia", "Saudi Arabia"] {
            let mut record = LeagueRecord {
                id: 307,
                name: Some("Pro League".into()),
                country: Some(country.into()),
                kind: Some("League".into()),
            };
            apply_curation(&mut record);
            assert_eq!(record.name.as_deref(), Some("Saudi Pro League"));
        }

        let mut belgian = LeagueRecord {
            id: 144,
            name: Some("Pro League".into()),
            country: Some("Belgium".into()),
            kind: None,
        };
        apply_curation(&mut belgian);
        assert_eq!(belgian.name.as_deref(), Some("Pro League"));

        let mut cup = LeagueRecord {
            id: 504,
            name: Some("King's Cup".into()),
            country: Some("Saudi-Arabia".into()),
            kind: Some("Cup".into()),
        };
        apply_curation(&mut cup);
        assert_eq!(cup.name.as_deref(), Some("King's Cup"));
    }

    #[test]
    fn test_validate_season() {
        assert!(validate_season("2024").is_ok());
        for bad in ["abcd", "24", "20245", "", "２０２４", "2O24"] {
            assert_eq!(
                validate_season(bad),
                Err(GatewayError::BadSeasonFormat { season: bad.into() })
            );
        }
    }

    #[test]
    fn test_serialized_shape() {
        let record = LeagueRecord {
            id: 307,
            name: Some("Saudi Pro League".into()),
            country: Some("Saudi-Arabia".into()),
            kind: None,
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"id": 307, "name": "Saudi Pro League", "country": "Saudi-Arabia", "type": null})
        );
    }

    #[tokio::test]
    async fn test_season_file_is_normalized_and_sorted() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "leagues_2024.json",
            r#"[
                {"id": "39", "name": "Premier League", "country": "England", "type": "League"},
                {"id": 45, "name": "FA Cup", "country": "England", "type": "Cup"},
                {"id": "307", "name": "Pro League", "country": "Saudi-Arabia"},
                {"id": "nope", "name": "Broken"},
                {"id": 2, "name": "UEFA Champions League", "type": "Cup"}
            ]"#,
        );

        let leagues = catalog(&dir, false).list_leagues("2024").await.unwrap();
        let ids: Vec<i64> = leagues.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![2, 45, 39, 307]);
        assert_eq!(leagues[3].name.as_deref(), Some("Saudi Pro League"));
        assert_eq!(leagues[3].kind, None);
    }

    #[tokio::test]
    async fn test_falls_back_to_undated_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "leagues.json", r#"[{"id": 140, "name": "La Liga", "country": "Spain"}]"#);

        let leagues = catalog(&dir, false).list_leagues("2023").await.unwrap();
        assert_eq!(leagues.len(), 1);
        assert_eq!(leagues[0].id, 140);
    }

    #[tokio::test]
    async fn test_unusable_season_file_falls_back() {
        let dir = TempDir::new().unwrap();
        write(&dir, "leagues.json", r#"[{"id": 61, "name": "Ligue 1", "country": "France"}]"#);

        for content in ["[]", "{not json", r#"{"id": 1}"#, r#"[{"id": "x"}]"#] {
            write(&dir, "leagues_2022.json", content);
            let leagues = catalog(&dir, false).list_leagues("2022").await.unwrap();
            assert_eq!(leagues[0].id, 61, "content {content} should fall back");
        }
    }

    #[tokio::test]
    async fn test_no_usable_source_is_not_found() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir, false);
        assert_eq!(
            catalog.list_leagues("2099").await,
            Err(GatewayError::ReferenceNotFound { season: "2099".into() })
        );

        write(&dir, "leagues.json", "[]");
        assert_eq!(
            catalog.list_leagues("2099").await,
            Err(GatewayError::ReferenceNotFound { season: "2099".into() })
        );
    }

    #[tokio::test]
    async fn test_bad_season_never_touches_disk() {
        let catalog = LeagueCatalog::new(&ReferenceConfig {
            data_dir: PathBuf::from("/definitely/not/here"),
            ..ReferenceConfig::default()
        });
        assert_eq!(
            catalog.list_leagues("abcd").await,
            Err(GatewayError::BadSeasonFormat { season: "abcd".into() })
        );
    }

    #[tokio::test]
    async fn test_cache_loads_once_and_skips_misses() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir, true);

        // Miss is not cached
        assert!(catalog.list_leagues("2024").await.is_err());

        write(&dir, "leagues_2024.json", r#"[{"id": 78, "name": "Bundesliga", "country": "Germany"}]"#);
        assert_eq!(catalog.list_leagues("2024").await.unwrap()[0].id, 78);

        // Hit is served from memory after the file changes
        write(&dir, "leagues_2024.json", r#"[{"id": 79, "name": "2. Bundesliga", "country": "Germany"}]"#);
        assert_eq!(catalog.list_leagues("2024").await.unwrap()[0].id, 78);
    }

    #[tokio::test]
    async fn test_without_cache_reads_every_time() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir, false);

        write(&dir, "leagues_2024.json", r#"[{"id": 78, "name": "Bundesliga", "country": "Germany"}]"#);
        assert_eq!(catalog.list_leagues("2024").await.unwrap()[0].id, 78);

        write(&dir, "leagues_2024.json", r#"[{"id": 79, "name": "2. Bundesliga", "country": "Germany"}]"#);
        assert_eq!(catalog.list_leagues("2024").await.unwrap()[0].id, 79);
    }
}
