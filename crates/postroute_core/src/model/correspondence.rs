//! Correspondence domain model.
//!
//! # Responsibility
//! - Define correspondents, postmarks and the correspondence item aggregate.
//! - Carry resolved place associations so route building needs no storage.
//!
//! # Invariants
//! - A correspondent is either a person or an entity, never both.
//! - Postmark `arrival_order` starts at 1 when present.
//! - `ItemPostmark::position` reflects insertion order on the item.

use crate::model::place::{normalize_label, Place, PlaceId};
use crate::model::validation::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CorrespondentId = Uuid;
pub type PostmarkId = Uuid;
pub type ItemId = Uuid;

/// Authoritative display identity of a correspondent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrespondentName {
    Person {
        title: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
    },
    Entity {
        name: String,
    },
}

impl CorrespondentName {
    pub fn person(first_name: &str, last_name: &str) -> Self {
        Self::Person {
            title: None,
            first_name: non_empty(first_name),
            last_name: non_empty(last_name),
        }
    }

    pub fn entity(name: &str) -> Self {
        Self::Entity {
            name: normalize_label(name),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Person {
                first_name,
                last_name,
                ..
            } => {
                if is_blank(first_name.as_deref()) && is_blank(last_name.as_deref()) {
                    return Err(ValidationError::EmptyPersonName);
                }
                Ok(())
            }
            Self::Entity { name } => {
                if name.trim().is_empty() {
                    return Err(ValidationError::EmptyEntityName);
                }
                Ok(())
            }
        }
    }

    /// Name used for display and for correspondent filters.
    pub fn display_name(&self) -> String {
        match self {
            Self::Person {
                title,
                first_name,
                last_name,
            } => [title, first_name, last_name]
                .iter()
                .filter_map(|part| part.as_deref())
                .map(normalize_label)
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            Self::Entity { name } => normalize_label(name),
        }
    }

    /// Case-folded display name; correspondent filters compare on it.
    pub fn display_key(&self) -> String {
        fold_display_name(&self.display_name())
    }
}

/// Folds a name for case-insensitive matching, Unicode-aware.
pub fn fold_display_name(value: &str) -> String {
    normalize_label(value).to_lowercase()
}

fn non_empty(value: &str) -> Option<String> {
    let normalized = normalize_label(value);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |text| text.trim().is_empty())
}

/// Sender or addressee of a correspondence item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correspondent {
    pub id: CorrespondentId,
    pub name: CorrespondentName,
    pub place: Option<Place>,
}

/// Input for creating a correspondent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrespondentDraft {
    pub name: CorrespondentName,
    pub place_id: Option<PlaceId>,
}

/// One point along a postal journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Postmark {
    pub id: PostmarkId,
    pub place: Option<Place>,
    pub date: Option<NaiveDate>,
    pub arrival_order: Option<u32>,
}

/// Input for creating a postmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostmarkDraft {
    pub place_id: Option<PlaceId>,
    pub date: Option<NaiveDate>,
    pub arrival_order: Option<u32>,
}

impl PostmarkDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.arrival_order {
            Some(0) => Err(ValidationError::InvalidArrivalOrder(0)),
            _ => Ok(()),
        }
    }
}

/// Postmark attached to an item, with its insertion position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPostmark {
    pub postmark: Postmark,
    pub position: u32,
}

/// Aggregate root for route computation, associations eagerly resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceItem {
    pub id: ItemId,
    pub title: String,
    pub date_of_correspondence: Option<NaiveDate>,
    pub sender: Option<Correspondent>,
    pub addressee: Option<Correspondent>,
    pub censor: Option<Place>,
    pub postmarks: Vec<ItemPostmark>,
}

impl CorrespondenceItem {
    /// Creates an item with no associations.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            date_of_correspondence: None,
            sender: None,
            addressee: None,
            censor: None,
            postmarks: Vec::new(),
        }
    }
}

/// Input for creating an item row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemDraft {
    pub title: String,
    pub date_of_correspondence: Option<NaiveDate>,
    pub sender_id: Option<CorrespondentId>,
    pub addressee_id: Option<CorrespondentId>,
    pub censor_place_id: Option<PlaceId>,
}

#[cfg(test)]
mod tests {
    use super::{fold_display_name, CorrespondentName, PostmarkDraft};
    use crate::model::validation::ValidationError;

    #[test]
    fn person_display_name_skips_missing_parts() {
        let name = CorrespondentName::Person {
            title: Some("Mrs.".to_string()),
            first_name: None,
            last_name: Some(" van  Dijk ".to_string()),
        };
        assert_eq!(name.display_name(), "Mrs. van Dijk");
    }

    #[test]
    fn display_key_folds_non_ascii_case() {
        let name = CorrespondentName::person("Émile", "MÜLLER");
        assert_eq!(name.display_key(), "émile müller");
        assert_eq!(fold_display_name("  ÉMILE   Müller "), name.display_key());
    }

    #[test]
    fn entity_and_person_validation() {
        assert_eq!(
            CorrespondentName::person("", " ").validate(),
            Err(ValidationError::EmptyPersonName)
        );
        assert_eq!(
            CorrespondentName::entity("  ").validate(),
            Err(ValidationError::EmptyEntityName)
        );
        assert!(CorrespondentName::entity("Red Cross").validate().is_ok());
    }

    #[test]
    fn zero_arrival_order_is_rejected() {
        let draft = PostmarkDraft {
            place_id: None,
            date: None,
            arrival_order: Some(0),
        };
        assert_eq!(
            draft.validate(),
            Err(ValidationError::InvalidArrivalOrder(0))
        );
    }
}
