use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::HvcError;

// Fixed namespace so a name always maps to the same voice actor id
const VOICE_ACTOR_NAMESPACE: Uuid = Uuid::from_u128(0x699d9c07_b965_4399_bafd_18a3cacf073c);

/// Stable voice actor id derived from the actor's name.
pub fn voice_actor_id(name: &str) -> String {
    Uuid::new_v5(&VOICE_ACTOR_NAMESPACE, name.as_bytes()).to_string()
}

/// Listening progress a user records in a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Progress {
    Marked,
    Listening,
    Listened,
    Replay,
    Postponed,
}

impl FromStr for Progress {
    type Err = HvcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "marked" => Ok(Progress::Marked),
            "listening" => Ok(Progress::Listening),
            "listened" => Ok(Progress::Listened),
            "replay" => Ok(Progress::Replay),
            "postponed" => Ok(Progress::Postponed),
            other => Err(HvcError::UnknownProgress(other.to_string())),
        }
    }
}

impl Progress {
    pub fn as_str(&self) -> &'static str {
        match self {
            Progress::Marked => "marked",
            Progress::Listening => "listening",
            Progress::Listened => "listened",
            Progress::Replay => "replay",
            Progress::Postponed => "postponed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewWork {
    pub id: i64,
    pub root_folder: String,
    pub dir: String,
    pub title: String,
    pub circle_id: i64,
    pub nsfw: Option<bool>,
    pub release: Option<String>,
    pub dl_count: Option<i64>,
    pub price: Option<i64>,
    pub review_count: Option<i64>,
    pub rate_count: Option<i64>,
    pub rate_average_2dp: Option<f64>,
    pub rate_count_detail: Option<String>,
    pub rank: Option<String>,
}

impl NewWork {
    /// Work with only the required fields set.
    pub fn new(id: i64, circle_id: i64, title: &str) -> Self {
        Self {
            id,
            root_folder: String::new(),
            dir: String::new(),
            title: title.to_string(),
            circle_id,
            nsfw: None,
            release: None,
            dl_count: None,
            price: None,
            review_count: None,
            rate_count: None,
            rate_average_2dp: None,
            rate_count_detail: None,
            rank: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CircleObj {
    pub id: i64,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SeriesObj {
    pub id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VoiceActorObj {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TagObj {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct VaCollection {
    pub vas: Vec<VoiceActorObj>,
}

// Tag entries may be all-null when the view emits a placeholder row
#[derive(Deserialize, Debug)]
pub(crate) struct RawTag {
    pub id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct TagCollection {
    pub tags: Vec<RawTag>,
}

/// One row of the catalog view with its JSON columns decoded.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    pub id: i64,
    pub title: String,
    pub circle_id: i64,
    pub nsfw: Option<bool>,
    pub release: Option<String>,
    pub dl_count: Option<i64>,
    pub price: Option<i64>,
    pub review_count: Option<i64>,
    pub rate_count: Option<i64>,
    pub rate_average_2dp: Option<f64>,
    pub rate_count_detail: Option<String>,
    pub rank: Option<String>,
    pub insert_time: Option<String>,
    pub series_id: Option<i64>,
    pub circle: CircleObj,
    pub series: Option<SeriesObj>,
    pub vas: Vec<VoiceActorObj>,
    pub tags: Vec<TagObj>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_actor_id_is_deterministic() {
        assert_eq!(voice_actor_id("VA"), voice_actor_id("VA"));
        assert_ne!(voice_actor_id("VA"), voice_actor_id("VB"));
        assert_eq!(voice_actor_id("VA").len(), 36);
    }

    #[test]
    fn test_progress_round_trip_names() {
        for p in [Progress::Marked, Progress::Listening, Progress::Listened, Progress::Replay, Progress::Postponed] {
            assert_eq!(p.as_str().parse::<Progress>().unwrap(), p);
        }
        assert!(matches!("abandoned".parse::<Progress>(), Err(HvcError::UnknownProgress(_))));
    }
}
