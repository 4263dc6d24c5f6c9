//! CSV encoders for the assignment list.
//!
//! Three dialects share one source of truth: the internal dump mirrors the
//! assignment record, the SportsEngine sheet swaps field keys for display
//! names, and the GameChanger sheet re-formats dates and clock times the way
//! that importer expects.

use std::collections::BTreeMap;
use std::str::FromStr;

use csv::{QuoteStyle, Writer, WriterBuilder};
use thiserror::Error;

use crate::schedule::Assignment;
use crate::{hhmm, hhmm_12, mdy};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Internal,
    SportsEngine,
    GameChanger,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown export dialect `{0}`")]
pub struct UnknownDialect(String);

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "internal" => Ok(Self::Internal),
            "sportsengine" => Ok(Self::SportsEngine),
            "gamechanger" => Ok(Self::GameChanger),
            other => Err(UnknownDialect(other.to_string())),
        }
    }
}

/// Friendly naming for a field key, maintained by league admins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldInfo {
    pub display_name: String,
    pub location: String,
    pub field_name: String,
}

pub type FieldDirectory = BTreeMap<String, FieldInfo>;
pub type TeamNames = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not encode csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not finish csv buffer: {0}")]
    Buffer(String),
}

pub fn encode(
    dialect: Dialect,
    assignments: &[Assignment],
    fields: &FieldDirectory,
    team_names: &TeamNames,
) -> Result<String, ExportError> {
    match dialect {
        Dialect::Internal => internal(assignments),
        Dialect::SportsEngine => sports_engine(assignments, fields, team_names),
        Dialect::GameChanger => game_changer(assignments, fields, team_names),
    }
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String, ExportError> {
    let buffer = writer
        .into_inner()
        .map_err(|error| ExportError::Buffer(error.to_string()))?;
    String::from_utf8(buffer).map_err(|error| ExportError::Buffer(error.to_string()))
}

fn team_label<'a>(team_names: &'a TeamNames, team_id: Option<&'a String>) -> &'a str {
    match team_id {
        Some(id) => team_names.get(id).map_or(id.as_str(), String::as_str),
        None => "",
    }
}

/// Column order matches the assignment record; every value is quoted,
/// header row included.
fn internal(assignments: &[Assignment]) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(vec![]);

    writer.write_record([
        "slotId",
        "gameDate",
        "startTime",
        "endTime",
        "fieldKey",
        "homeTeamId",
        "awayTeamId",
        "isExternalOffer",
    ])?;

    for assignment in assignments {
        let game_date = assignment.game_date.to_string();
        let start = hhmm(assignment.time.start());
        let end = hhmm(assignment.time.end());

        writer.write_record([
            assignment.slot_id.as_str(),
            game_date.as_str(),
            start.as_str(),
            end.as_str(),
            assignment.field_key.as_str(),
            assignment.home_team_id.as_deref().unwrap_or(""),
            assignment.away_team_id.as_deref().unwrap_or(""),
            if assignment.is_external_offer {
                "true"
            } else {
                "false"
            },
        ])?;
    }

    finish(writer)
}

fn sports_engine(
    assignments: &[Assignment],
    fields: &FieldDirectory,
    team_names: &TeamNames,
) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(vec![]);

    writer.write_record([
        "Event Type",
        "Start Date",
        "Start Time",
        "End Date",
        "End Time",
        "Location",
        "Home Team",
        "Away Team",
    ])?;

    for assignment in assignments {
        let location = fields
            .get(&assignment.field_key)
            .map_or(assignment.field_key.as_str(), |info| {
                info.display_name.as_str()
            });
        let game_date = assignment.game_date.to_string();
        let start = hhmm(assignment.time.start());
        let end = hhmm(assignment.time.end());

        writer.write_record([
            "Game",
            game_date.as_str(),
            start.as_str(),
            game_date.as_str(),
            end.as_str(),
            location,
            team_label(team_names, assignment.home_team_id.as_ref()),
            team_label(team_names, assignment.away_team_id.as_ref()),
        ])?;
    }

    finish(writer)
}

fn game_changer(
    assignments: &[Assignment],
    fields: &FieldDirectory,
    team_names: &TeamNames,
) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(vec![]);

    writer.write_record([
        "Game Number",
        "Date",
        "Start Time",
        "End Time",
        "Location",
        "Field",
        "Home Team",
        "Away Team",
    ])?;

    for (index, assignment) in assignments.iter().enumerate() {
        let (location, field_name) = fields
            .get(&assignment.field_key)
            .map_or((assignment.field_key.as_str(), ""), |info| {
                (info.location.as_str(), info.field_name.as_str())
            });

        let game_number = (index + 1).to_string();
        let game_date = mdy(assignment.game_date);
        let start = hhmm_12(assignment.time.start());
        let end = hhmm_12(assignment.time.end());

        writer.write_record([
            game_number.as_str(),
            game_date.as_str(),
            start.as_str(),
            end.as_str(),
            location,
            field_name,
            team_label(team_names, assignment.home_team_id.as_ref()),
            team_label(team_names, assignment.away_team_id.as_ref()),
        ])?;
    }

    finish(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimeRange;
    use chrono::NaiveDate;

    fn assignment() -> Assignment {
        Assignment {
            slot_id: "slot-1".into(),
            game_date: NaiveDate::from_ymd_opt(2026, 4, 11).unwrap(),
            time: TimeRange::new(18 * 60, 19 * 60 + 30).unwrap(),
            field_key: "park/field,1".into(),
            home_team_id: Some("tigers".into()),
            away_team_id: Some("hawks".into()),
            is_external_offer: false,
        }
    }

    fn directory() -> FieldDirectory {
        let mut fields = FieldDirectory::new();
        fields.insert(
            "park/field,1".into(),
            FieldInfo {
                display_name: "Main \"Field\"".into(),
                location: "Riverside Park".into(),
                field_name: "Field 1".into(),
            },
        );
        fields
    }

    #[test]
    fn dialect_names_parse() {
        assert_eq!("internal".parse(), Ok(Dialect::Internal));
        assert_eq!("sportsengine".parse(), Ok(Dialect::SportsEngine));
        assert_eq!("gamechanger".parse(), Ok(Dialect::GameChanger));
        assert!("excel".parse::<Dialect>().is_err());
    }

    #[test]
    fn internal_dialect_quotes_everything() {
        let csv = encode(
            Dialect::Internal,
            &[assignment()],
            &directory(),
            &TeamNames::new(),
        )
        .unwrap();

        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "\"slotId\",\"gameDate\",\"startTime\",\"endTime\",\"fieldKey\",\"homeTeamId\",\"awayTeamId\",\"isExternalOffer\""
        );
        assert_eq!(
            lines.next().unwrap(),
            "\"slot-1\",\"2026-04-11\",\"18:00\",\"19:30\",\"park/field,1\",\"tigers\",\"hawks\",\"false\""
        );
    }

    #[test]
    fn sports_engine_doubles_embedded_quotes() {
        let csv = encode(
            Dialect::SportsEngine,
            &[assignment()],
            &directory(),
            &TeamNames::new(),
        )
        .unwrap();

        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("\"Main \"\"Field\"\"\""));
        assert!(row.starts_with("Game,2026-04-11,18:00,2026-04-11,19:30,"));
    }

    #[test]
    fn game_changer_reformats_dates_times_and_numbers_games() {
        let mut second = assignment();
        second.slot_id = "slot-2".into();
        second.time = TimeRange::new(9 * 60, 10 * 60).unwrap();

        let mut team_names = TeamNames::new();
        team_names.insert("tigers".into(), "Rivertown Tigers".into());

        let csv = encode(
            Dialect::GameChanger,
            &[assignment(), second],
            &directory(),
            &team_names,
        )
        .unwrap();

        let rows: Vec<&str> = csv.lines().collect();
        assert_eq!(
            rows[1],
            "1,04/11/2026,6:00 PM,7:30 PM,Riverside Park,Field 1,Rivertown Tigers,hawks"
        );
        assert_eq!(
            rows[2],
            "2,04/11/2026,9:00 AM,10:00 AM,Riverside Park,Field 1,Rivertown Tigers,hawks"
        );
    }

    #[test]
    fn unknown_fields_fall_back_to_the_raw_key() {
        let csv = encode(
            Dialect::SportsEngine,
            &[assignment()],
            &FieldDirectory::new(),
            &TeamNames::new(),
        )
        .unwrap();

        assert!(csv.lines().nth(1).unwrap().contains("\"park/field,1\""));
    }

    #[test]
    fn csv_round_trip_preserves_semantic_fields() {
        let source = assignment();
        let csv = encode(
            Dialect::Internal,
            &[source.clone()],
            &FieldDirectory::new(),
            &TeamNames::new(),
        )
        .unwrap();

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let record = reader.records().next().unwrap().unwrap();

        assert_eq!(&record[0], source.slot_id.as_str());
        assert_eq!(&record[1], "2026-04-11");
        assert_eq!(&record[2], "18:00");
        assert_eq!(&record[3], "19:30");
        assert_eq!(&record[4], source.field_key.as_str());
        assert_eq!(&record[5], "tigers");
        assert_eq!(&record[6], "hawks");
        assert_eq!(&record[7], "false");
    }
}
