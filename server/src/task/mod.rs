use crate::entities::*;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::*;
use std::fmt;
use std::str::FromStr;

pub mod web;

/// The fixed category of a task. Any other submitted value is rejected
/// before a record is built.
#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub enum TaskKind {
    Geek,
    Nerd,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Geek => "geek",
            TaskKind::Nerd => "nerd",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a submitted task kind is not one of the known values.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized task kind '{0}'")]
pub struct ParseTaskKindError(pub String);

impl FromStr for TaskKind {
    type Err = ParseTaskKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geek" => Ok(TaskKind::Geek),
            "nerd" => Ok(TaskKind::Nerd),
            other => Err(ParseTaskKindError(other.to_string())),
        }
    }
}

/// One logged event, owned by the identity that submitted it.
/// Tasks are immutable once created; there is no update or delete path.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Task {
    id: u32,
    owner: String,
    kind: TaskKind,
    content: String,
    event_date: NaiveDate,
    created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: u32,
        owner: String,
        kind: TaskKind,
        content: String,
        event_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            kind,
            content,
            event_date,
            created_at,
        }
    }

    /// Returns the store-assigned ID of the task.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the owner identity of the task.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the kind of the task.
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Returns the free-text topic of the task.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the user-supplied event date.
    pub fn event_date(&self) -> NaiveDate {
        self.event_date
    }

    /// Returns the server-assigned creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Error type for TaskService operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    /// Represents a stored row whose kind column no longer matches the enumeration.
    #[error("Stored task {id} has unrecognized kind '{kind}'")]
    CorruptKind { id: u32, kind: String },
}

impl TryFrom<task::Model> for Task {
    type Error = TaskServiceError;

    fn try_from(model: task::Model) -> Result<Self, Self::Error> {
        let kind = model
            .kind
            .parse::<TaskKind>()
            .map_err(|_| TaskServiceError::CorruptKind {
                id: model.id as u32,
                kind: model.kind.clone(),
            })?;
        Ok(Task::new(
            model.id as u32,
            model.owner,
            kind,
            model.content,
            model.event_date,
            model.created_at,
        ))
    }
}

pub struct TaskService<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl TaskService<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> TaskService {
        TaskService { db }
    }

    /// Creates a new task record in the database.
    ///
    /// # Arguments
    ///
    /// * `owner` - The identity that submitted the task.
    /// * `kind` - The validated task kind.
    /// * `content` - The free-text topic.
    /// * `event_date` - The user-supplied event date.
    ///
    /// # Returns
    ///
    /// A `Result` containing the created `Task` if successful, or an error otherwise.
    /// The creation time is assigned here, not by the caller.
    #[tracing::instrument(skip(self))]
    pub async fn create_task(
        &self,
        owner: &str,
        kind: TaskKind,
        content: &str,
        event_date: NaiveDate,
    ) -> Result<Task, TaskServiceError> {
        let active_model = task::ActiveModel {
            owner: ActiveValue::Set(owner.to_owned()),
            kind: ActiveValue::Set(kind.as_str().to_owned()),
            content: ActiveValue::Set(content.to_owned()),
            event_date: ActiveValue::Set(event_date),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        };
        let created_model = active_model.insert(self.db).await?;
        Task::try_from(created_model)
    }

    /// Retrieves all task records for one owner, most recent event date first.
    ///
    /// # Returns
    ///
    /// A `Result` containing a vector of `Task` if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn list_tasks_by_owner(&self, owner: &str) -> Result<Vec<Task>, TaskServiceError> {
        let tasks = task::Entity::find()
            .filter(task::Column::Owner.eq(owner))
            .order_by_desc(task::Column::EventDate)
            .all(self.db)
            .await?
            .into_iter()
            .map(Task::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }
}

/// Parses a user-supplied event date, trying "month.day.year" first and
/// "month/day/year" second. Anything else is rejected.
pub fn parse_event_date(input: &str) -> Result<NaiveDate, chrono::ParseError> {
    match NaiveDate::parse_from_str(input, "%m.%d.%Y") {
        Ok(date) => Ok(date),
        Err(_) => NaiveDate::parse_from_str(input, "%m/%d/%Y"),
    }
}

/// Formats an event date for the list table, e.g. "Mar 4, 2024 at 12:00am (UTC)".
/// Event dates carry no time of day, so the time component is always midnight.
pub fn format_event_date(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN)
        .format("%b %-d, %Y at %-I:%M%P (UTC)")
        .to_string()
}

/// Formats a creation timestamp for the list table, e.g. "03/04/2024 at 3:04pm (GMT)".
pub fn format_created_at(created_at: DateTime<Utc>) -> String {
    created_at.format("%m/%d/%Y at %-I:%M%P (GMT)").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn can_parse_dotted_date() {
        let date = parse_event_date("3.4.2024").expect("dotted date should parse");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }

    #[test]
    fn can_parse_slashed_date() {
        let date = parse_event_date("3/4/2024").expect("slashed date should parse");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }

    #[test]
    fn dotted_and_slashed_dates_agree() {
        assert_eq!(
            parse_event_date("3.4.2024").unwrap(),
            parse_event_date("3/4/2024").unwrap()
        );
    }

    #[test]
    fn rejects_iso_date() {
        assert!(parse_event_date("2024-03-04").is_err());
    }

    #[test]
    fn rejects_empty_date() {
        assert!(parse_event_date("").is_err());
    }

    #[test]
    fn can_parse_known_kinds() {
        assert_eq!("geek".parse::<TaskKind>().unwrap(), TaskKind::Geek);
        assert_eq!("nerd".parse::<TaskKind>().unwrap(), TaskKind::Nerd);
    }

    #[test]
    fn kind_match_is_anchored() {
        assert!("geeky".parse::<TaskKind>().is_err());
        assert!("xnerd".parse::<TaskKind>().is_err());
        assert!("Geek".parse::<TaskKind>().is_err());
        assert!("geek nerd".parse::<TaskKind>().is_err());
        assert!("".parse::<TaskKind>().is_err());
    }

    #[test]
    fn kind_round_trips_through_display() {
        assert_eq!(TaskKind::Geek.to_string(), "geek");
        assert_eq!(TaskKind::Nerd.to_string(), "nerd");
    }

    #[test]
    fn can_format_event_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(format_event_date(date), "Mar 4, 2024 at 12:00am (UTC)");
    }

    #[test]
    fn can_format_created_at() {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 4, 15, 4, 0).unwrap();
        assert_eq!(format_created_at(created_at), "03/04/2024 at 3:04pm (GMT)");
    }

    #[test]
    fn corrupt_kind_is_reported() {
        let model = task::Model {
            id: 7,
            owner: "someone".to_string(),
            kind: "wizard".to_string(),
            content: "topic".to_string(),
            event_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            created_at: Utc::now(),
        };
        let err = Task::try_from(model).unwrap_err();
        assert!(matches!(
            err,
            TaskServiceError::CorruptKind { id: 7, .. }
        ));
    }
}
