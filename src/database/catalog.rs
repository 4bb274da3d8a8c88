use rusqlite::{params_from_iter, types::Value, Connection, Row};

use crate::database::catalog_view::CATALOG_VIEW_NAME;
use crate::database::tables::*;
use crate::database::types::{CatalogRecord, CircleObj, SeriesObj, TagCollection, TagObj, VaCollection};
use crate::errors::HvcError;

/// Predicate applied to the catalog view.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogFilter {
    All,
    Circle(i64),
    Tag(i64),
    VoiceActor(String),
    Series(i64),
}

impl CatalogFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        match self {
            CatalogFilter::All => (String::new(), vec![]),
            CatalogFilter::Circle(id) => ("WHERE circle_id = ?1".to_string(), vec![Value::Integer(*id)]),
            CatalogFilter::Tag(id) => (
                format!("WHERE id IN (SELECT work_id FROM {DB_TAG_WORK_NAME} WHERE tag_id = ?1)"),
                vec![Value::Integer(*id)],
            ),
            CatalogFilter::VoiceActor(id) => (
                format!("WHERE id IN (SELECT work_id FROM {DB_VA_WORK_NAME} WHERE va_id = ?1)"),
                vec![Value::Text(id.clone())],
            ),
            CatalogFilter::Series(id) => (
                format!("WHERE id IN (SELECT id FROM {DB_WORK_NAME} WHERE series_id = ?1)"),
                vec![Value::Integer(*id)],
            ),
        }
    }
}

// Older views predate some columns; a missing column reads as NULL
fn optional_column<T: rusqlite::types::FromSql>(row: &Row, name: &str) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<T>>(name) {
        Err(rusqlite::Error::InvalidColumnName(_)) => Ok(None),
        other => other,
    }
}

struct RawRecord {
    record: CatalogRecord,
    circle_json: String,
    series_json: Option<String>,
    va_json: String,
    tag_json: String,
}

fn read_row(row: &Row) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        record: CatalogRecord {
            id: row.get("id")?,
            title: row.get("title")?,
            circle_id: row.get("circle_id")?,
            nsfw: optional_column(row, "nsfw")?,
            release: optional_column(row, "release")?,
            dl_count: optional_column(row, "dl_count")?,
            price: optional_column(row, "price")?,
            review_count: optional_column(row, "review_count")?,
            rate_count: optional_column(row, "rate_count")?,
            rate_average_2dp: optional_column(row, "rate_average_2dp")?,
            rate_count_detail: optional_column(row, "rate_count_detail")?,
            rank: optional_column(row, "rank")?,
            insert_time: optional_column(row, "insert_time")?,
            series_id: optional_column(row, "series_id")?,
            circle: CircleObj { id: 0, name: String::new() },
            series: None,
            vas: vec![],
            tags: vec![],
        },
        circle_json: row.get("circleObj")?,
        series_json: optional_column(row, "seriesObj")?,
        va_json: row.get("vaObj")?,
        tag_json: row.get("tagObj")?,
    })
}

fn decode(raw: RawRecord) -> Result<CatalogRecord, HvcError> {
    let mut record = raw.record;
    record.circle = serde_json::from_str(&raw.circle_json)?;
    record.series = match raw.series_json {
        Some(json) => {
            let series: SeriesObj = serde_json::from_str(&json)?;
            // A work outside any series carries an all-null object
            if series.id.is_none() && series.name.is_none() {
                None
            } else {
                Some(series)
            }
        }
        None => None,
    };
    record.vas = serde_json::from_str::<VaCollection>(&raw.va_json)?.vas;
    // Views created by older builds emit a null placeholder for tagless works
    record.tags = serde_json::from_str::<TagCollection>(&raw.tag_json)?
        .tags
        .into_iter()
        .filter_map(|t| {
            Some(TagObj {
                id: t.id?,
                name: t.name.unwrap_or_default(),
            })
        })
        .collect();
    Ok(record)
}

/// Catalog rows matching `filter`, ordered by work id.
pub fn list_catalog_works(conn: &Connection, filter: &CatalogFilter) -> Result<Vec<CatalogRecord>, HvcError> {
    let (where_clause, values) = filter.where_clause();
    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM {CATALOG_VIEW_NAME} {where_clause} ORDER BY id"
    ))?;
    let raws = stmt
        .query_map(params_from_iter(values), read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    raws.into_iter().map(decode).collect()
}

/// Catalog row of one work. `None` when the work is unknown or has no voice actor.
pub fn get_catalog_work(conn: &Connection, work_id: i64) -> Result<Option<CatalogRecord>, HvcError> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {CATALOG_VIEW_NAME} WHERE id = ?1"))?;
    let mut rows = stmt.query([work_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(decode(read_row(row)?)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::catalog_view::{catalog_view_sql, ViewProjection};
    use crate::database::migration::{ensure_schema, migrate};
    use crate::database::queries::*;
    use crate::database::types::{NewWork, VoiceActorObj};

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn seed_scenario(conn: &Connection) {
        insert_circle(conn, 1, "C").unwrap();
        insert_work(conn, &NewWork::new(1, 1, "T")).unwrap();
        insert_voice_actor_with_id(conn, "va-1", "VA").unwrap();
        link_voice_actor(conn, "va-1", 1).unwrap();
        insert_tag(conn, 1, "tag1").unwrap();
        link_tag(conn, 1, 1).unwrap();
    }

    #[test]
    fn test_scenario_full_record() {
        let conn = migrated();
        seed_scenario(&conn);

        let record = get_catalog_work(&conn, 1).unwrap().unwrap();
        assert_eq!(record.title, "T");
        assert_eq!(record.circle, CircleObj { id: 1, name: "C".to_string() });
        assert_eq!(record.series, None);
        assert_eq!(record.vas, vec![VoiceActorObj { id: "va-1".to_string(), name: "VA".to_string() }]);
        assert_eq!(record.tags, vec![TagObj { id: 1, name: "tag1".to_string() }]);
        assert_eq!(list_catalog_works(&conn, &CatalogFilter::All).unwrap().len(), 1);
    }

    #[test]
    fn test_scenario_without_tag_link() {
        let conn = migrated();
        seed_scenario(&conn);
        unlink_tag(&conn, 1, 1).unwrap();

        let record = get_catalog_work(&conn, 1).unwrap().unwrap();
        assert_eq!(record.vas.len(), 1);
        assert!(record.tags.is_empty());

        let raw: String = conn
            .query_row("SELECT tagObj FROM staticMetadata WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(raw, r#"{"tags":[]}"#);
    }

    #[test]
    fn test_scenario_without_voice_actor_link() {
        let conn = migrated();
        seed_scenario(&conn);
        unlink_voice_actor(&conn, "va-1", 1).unwrap();

        assert_eq!(get_catalog_work(&conn, 1).unwrap(), None);
        assert!(list_catalog_works(&conn, &CatalogFilter::All).unwrap().is_empty());
    }

    #[test]
    fn test_counts_are_exact_per_work() {
        let conn = migrated();
        insert_circle(&conn, 1, "C").unwrap();
        insert_work(&conn, &NewWork::new(1, 1, "first")).unwrap();
        insert_work(&conn, &NewWork::new(2, 1, "second")).unwrap();

        let vas: Vec<String> = ["A", "B", "C"].iter().map(|n| insert_voice_actor(&conn, n).unwrap()).collect();
        for va in &vas {
            link_voice_actor(&conn, va, 1).unwrap();
        }
        link_voice_actor(&conn, &vas[0], 2).unwrap();
        for tag in 1..=4 {
            insert_tag(&conn, tag, &format!("tag{tag}")).unwrap();
            link_tag(&conn, tag, 1).unwrap();
        }
        link_tag(&conn, 4, 2).unwrap();

        let first = get_catalog_work(&conn, 1).unwrap().unwrap();
        assert_eq!(first.vas.len(), 3);
        assert_eq!(first.tags.len(), 4);
        assert_eq!(first.tags.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);

        let second = get_catalog_work(&conn, 2).unwrap().unwrap();
        assert_eq!(second.vas.len(), 1);
        assert_eq!(second.vas[0].id, vas[0]);
        assert_eq!(second.tags, vec![TagObj { id: 4, name: "tag4".to_string() }]);
    }

    #[test]
    fn test_filters() {
        let conn = migrated();
        seed_scenario(&conn);
        insert_circle(&conn, 2, "D").unwrap();
        insert_work(&conn, &NewWork::new(2, 2, "U")).unwrap();
        link_voice_actor(&conn, "va-1", 2).unwrap();
        insert_series(&conn, 7, Some("S")).unwrap();
        set_work_series(&conn, 2, Some(7)).unwrap();

        let ids = |f: CatalogFilter| -> Vec<i64> {
            list_catalog_works(&conn, &f).unwrap().iter().map(|r| r.id).collect()
        };
        assert_eq!(ids(CatalogFilter::All), vec![1, 2]);
        assert_eq!(ids(CatalogFilter::Circle(2)), vec![2]);
        assert_eq!(ids(CatalogFilter::Tag(1)), vec![1]);
        assert_eq!(ids(CatalogFilter::VoiceActor("va-1".to_string())), vec![1, 2]);
        assert_eq!(ids(CatalogFilter::Series(7)), vec![2]);

        let second = get_catalog_work(&conn, 2).unwrap().unwrap();
        assert_eq!(second.series_id, Some(7));
        assert_eq!(second.series, Some(SeriesObj { id: Some(7), name: Some("S".to_string()) }));
    }

    #[test]
    fn test_reads_view_from_before_optional_columns() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        seed_scenario(&conn);

        let record = get_catalog_work(&conn, 1).unwrap().unwrap();
        assert_eq!(record.insert_time, None);
        assert_eq!(record.series_id, None);
        assert_eq!(record.tags.len(), 1);
    }

    #[test]
    fn test_tolerates_null_tag_placeholder() {
        let conn = migrated();
        seed_scenario(&conn);
        unlink_tag(&conn, 1, 1).unwrap();

        // View as written before aggregates filtered out the null join row
        let sql = catalog_view_sql(&ViewProjection::introspect(&conn).unwrap())
            .replace("\n        FILTER (WHERE t_tag.id IS NOT NULL)", "");
        conn.execute("DROP VIEW staticMetadata", []).unwrap();
        conn.execute(&sql, []).unwrap();

        let raw: String = conn
            .query_row("SELECT tagObj FROM staticMetadata WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert!(raw.contains("null"));
        assert!(get_catalog_work(&conn, 1).unwrap().unwrap().tags.is_empty());
    }
}
