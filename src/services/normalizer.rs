//! Raw record cleanup.
//!
//! Turns a [`RawRecord`] into an [`Item`]: canonical title, year, genre tags and
//! the token bag the vectorizer consumes. Parsing is total: a malformed field
//! degrades to an empty value and never rejects the record.

use crate::models::{BuildConfig, Item, Label, ListField, Person, PersonEntry, RawRecord};

/// MovieLens marks untagged movies with this sentinel
const NO_GENRES: &str = "(no genres listed)";

const DIRECTOR_JOB: &str = "Director";

/// Normalizes a batch of records, preserving input order
pub fn normalize_all(records: &[RawRecord], config: &BuildConfig) -> Vec<Item> {
    records.iter().map(|r| normalize(r, config)).collect()
}

/// Normalizes one record into a catalogue item
pub fn normalize(record: &RawRecord, config: &BuildConfig) -> Item {
    let title = record.title.as_deref().map(str::trim).unwrap_or_default();
    let (canonical_title, year) = split_title(title);

    let genres = record.genres.as_ref().map(parse_genres).unwrap_or_default();
    let cast = record.cast.as_ref().map(parse_people).unwrap_or_default();
    let crew = record.crew.as_ref().map(parse_people).unwrap_or_default();

    let mut tokens: Vec<String> = canonical_title
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if config.include_genres {
        tokens.extend(genres.iter().cloned());
    }

    tokens.extend(
        names(&cast, None)
            .into_iter()
            .take(config.cast_limit),
    );

    let directors = names(&crew, Some(DIRECTOR_JOB));
    if directors.is_empty() {
        tokens.extend(
            names(&crew, None)
                .into_iter()
                .take(config.crew_fallback_limit),
        );
    } else {
        tokens.extend(directors);
    }

    let key = record.id.clone().unwrap_or_else(|| title.to_string());

    Item {
        key,
        id: record.id.clone(),
        title: title.to_string(),
        canonical_title,
        year,
        genres,
        tokens,
    }
}

/// Splits "Toy Story (1995)" into ("Toy Story", Some(1995)).
///
/// The canonical title drops everything from the last '(' on. The year is the
/// four characters before a trailing ')' and is `None` if they are not a number.
pub fn split_title(title: &str) -> (String, Option<i32>) {
    let title = title.trim();

    let canonical = match title.rfind('(') {
        Some(pos) => title[..pos].trim().to_string(),
        None => title.to_string(),
    };

    (canonical, parse_year(title))
}

fn parse_year(title: &str) -> Option<i32> {
    if !title.ends_with(')') || !title.contains('(') {
        return None;
    }

    let chars: Vec<char> = title.chars().collect();
    if chars.len() < 5 {
        return None;
    }

    chars[chars.len() - 5..chars.len() - 1]
        .iter()
        .collect::<String>()
        .parse()
        .ok()
}

/// Genre tags from a pipe/comma string, a JSON-encoded list, or a structured list
pub fn parse_genres(field: &ListField<Label>) -> Vec<String> {
    let labels = match field {
        ListField::Entries(labels) => labels.clone(),
        ListField::Encoded(text) => {
            let text = text.trim();
            if text.starts_with('[') {
                serde_json::from_str::<Vec<Label>>(text).unwrap_or_default()
            } else if text.is_empty() || text == NO_GENRES {
                Vec::new()
            } else {
                text.split(['|', ','])
                    .map(|g| Label::Plain(g.to_string()))
                    .collect()
            }
        }
        ListField::Unrecognized(_) => Vec::new(),
    };

    labels
        .into_iter()
        .filter_map(|label| match label {
            Label::Plain(name) | Label::Named { name } => Some(name.trim().to_string()),
            Label::Other(_) => None,
        })
        .filter(|name| !name.is_empty() && name != NO_GENRES)
        .collect()
}

/// Cast/crew members from a structured list or a JSON-encoded string
pub fn parse_people(field: &ListField<PersonEntry>) -> Vec<Person> {
    let entries = match field {
        ListField::Entries(entries) => entries.clone(),
        ListField::Encoded(text) => {
            serde_json::from_str::<Vec<PersonEntry>>(text.trim()).unwrap_or_default()
        }
        ListField::Unrecognized(_) => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|entry| match entry {
            PersonEntry::Person(person) => Some(person),
            PersonEntry::Other(_) => None,
        })
        .collect()
}

/// Compacted names, optionally restricted to one job. "Sam Worthington" becomes "SamWorthington".
fn names(people: &[Person], job: Option<&str>) -> Vec<String> {
    people
        .iter()
        .filter(|p| job.map_or(true, |job| p.job.as_deref() == Some(job)))
        .filter_map(|p| p.name.as_deref())
        .map(compact_name)
        .filter(|name| !name.is_empty())
        .collect()
}

fn compact_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}
