//! Loads a fully-materialized feed file. Upstream pagination and retries happen before this
//! program ever runs; we only see the decoded result.

use anyhow::{Context, Result};

use crate::records::Feed;

pub fn load_feed(path: &str) -> Result<Feed> {
    let bytes = fs_err::read(path)?;
    let feed: Feed =
        serde_json::from_slice(&bytes).with_context(|| format!("can't decode feed {}", path))?;
    info!(
        "Loaded {} links, {} attributes, {} restrictions from {}",
        feed.links.len(),
        feed.attributes.len(),
        feed.restrictions.len(),
        path
    );
    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_minimal_feed() {
        let path = std::env::temp_dir().join("convert_nvdb_feed_test.json");
        fs_err::write(
            &path,
            r#"{
                "links": [{
                    "id": 1, "sequence_id": 7, "sequence_start": 0.0, "sequence_end": 1.0,
                    "start_node": 1, "end_node": 2,
                    "geometry": [[10.0, 60.0], [10.001, 60.0]],
                    "medium": "T", "class": "carriageway", "category": "K"
                }],
                "attributes": [{
                    "reference_id": 7, "range_start": 0.0, "range_end": 1.0,
                    "attribute": {"kind": "speed_limit", "kmh": 50}
                }]
            }"#,
        )
        .unwrap();

        let feed = load_feed(path.to_str().unwrap()).unwrap();
        assert_eq!(feed.links.len(), 1);
        assert_eq!(feed.attributes.len(), 1);
        assert!(feed.restrictions.is_empty());
    }

    #[test]
    fn malformed_feed_is_an_error() {
        let path = std::env::temp_dir().join("convert_nvdb_bad_feed_test.json");
        fs_err::write(&path, "{not json").unwrap();
        assert!(load_feed(path.to_str().unwrap()).is_err());
    }
}
