//! Complaint domain model.
//!
//! A complaint carries a lifecycle `status`, a `priority` and a wide set of
//! free-text descriptive fields. Descriptive fields are never empty: anything
//! left blank by the submitter is stored as [`PLACEHOLDER`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidateEmail, ValidationError};

/// Stored in place of any optional descriptive field left blank.
pub const PLACEHOLDER: &str = "-";

/// Actor recorded on the history row written at creation.
pub const CREATION_ACTOR: &str = "Customer";

/// Lifecycle status of a complaint.
///
/// Any status may move to any other status; the lifecycle does not restrict
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplaintStatus {
    New,
    InProgress,
    Resolved,
    Closed,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 4] = [
        ComplaintStatus::New,
        ComplaintStatus::InProgress,
        ComplaintStatus::Resolved,
        ComplaintStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::New => "new",
            ComplaintStatus::InProgress => "in-progress",
            ComplaintStatus::Resolved => "resolved",
            ComplaintStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(ComplaintStatus::New),
            "in-progress" => Ok(ComplaintStatus::InProgress),
            "resolved" => Ok(ComplaintStatus::Resolved),
            "closed" => Ok(ComplaintStatus::Closed),
            _ => Err(InvalidValue::new("status", s)),
        }
    }
}

/// Complaint priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(InvalidValue::new("priority", s)),
        }
    }
}

/// A stored enum column or request value that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: '{value}'")]
pub struct InvalidValue {
    pub kind: &'static str,
    pub value: String,
}

impl InvalidValue {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// A submitted field that fails a domain rule not expressible in `validator`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} {reason}")]
pub struct FieldError {
    pub field: &'static str,
    pub reason: &'static str,
}

/// Descriptive complaint fields, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintDetails {
    pub complaint_source: String,
    pub place_of_supply: String,
    pub complaint_receiving_location: String,
    pub depo_party_name: String,
    pub email: String,
    pub contact_number: String,
    pub invoice_no: String,
    pub invoice_date: String,
    pub lr_number: String,
    pub transporter_name: String,
    pub transporter_number: String,
    pub complaint_type: String,
    pub voc: String,
    pub sales_person_name: String,
    pub category: String,
    pub product_name: String,
    pub area_of_concern: String,
    pub sub_category: String,
    pub action_taken: String,
    pub credit_date: String,
    pub credit_note_number: String,
    pub credit_amount: String,
    pub person_responsible: String,
    pub root_cause_analysis: String,
    /// Free-text outcome. Carries no lifecycle meaning; `status` does.
    pub final_status: String,
}

const FIELD_COUNT: usize = 25;

/// JSON names of the descriptive fields, in slot order.
const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "complaintSource",
    "placeOfSupply",
    "complaintReceivingLocation",
    "depoPartyName",
    "email",
    "contactNumber",
    "invoiceNo",
    "invoiceDate",
    "lrNumber",
    "transporterName",
    "transporterNumber",
    "complaintType",
    "voc",
    "salesPersonName",
    "category",
    "productName",
    "areaOfConcern",
    "subCategory",
    "actionTaken",
    "creditDate",
    "creditNoteNumber",
    "creditAmount",
    "personResponsible",
    "rootCauseAnalysis",
    "finalStatus",
];

const REQUIRED_FIELDS: [&str; 3] = ["complaintSource", "depoPartyName", "complaintType"];

impl ComplaintDetails {
    fn slots_mut(&mut self) -> [&mut String; FIELD_COUNT] {
        [
            &mut self.complaint_source,
            &mut self.place_of_supply,
            &mut self.complaint_receiving_location,
            &mut self.depo_party_name,
            &mut self.email,
            &mut self.contact_number,
            &mut self.invoice_no,
            &mut self.invoice_date,
            &mut self.lr_number,
            &mut self.transporter_name,
            &mut self.transporter_number,
            &mut self.complaint_type,
            &mut self.voc,
            &mut self.sales_person_name,
            &mut self.category,
            &mut self.product_name,
            &mut self.area_of_concern,
            &mut self.sub_category,
            &mut self.action_taken,
            &mut self.credit_date,
            &mut self.credit_note_number,
            &mut self.credit_amount,
            &mut self.person_responsible,
            &mut self.root_cause_analysis,
            &mut self.final_status,
        ]
    }

    /// Overwrites every field supplied in `fields`, normalizing blanks.
    ///
    /// Callers validate required fields first with [`ComplaintFields::check_required`].
    pub fn apply(&mut self, fields: &ComplaintFields) {
        for (slot, value) in self.slots_mut().into_iter().zip(fields.slots()) {
            if let Some(value) = value {
                *slot = normalize(Some(value));
            }
        }
    }
}

/// Descriptive complaint fields as submitted. Every field is optional on the
/// wire; required ones are enforced by [`ComplaintDraft`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintFields {
    #[validate(length(max = 100, message = "Complaint source must be at most 100 characters"))]
    pub complaint_source: Option<String>,
    #[validate(length(max = 200))]
    pub place_of_supply: Option<String>,
    #[validate(length(max = 200))]
    pub complaint_receiving_location: Option<String>,
    #[validate(length(max = 200, message = "Party name must be at most 200 characters"))]
    pub depo_party_name: Option<String>,
    #[validate(custom(function = "validate_optional_email"))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_optional_contact_number"))]
    pub contact_number: Option<String>,
    #[validate(length(max = 100))]
    pub invoice_no: Option<String>,
    #[validate(length(max = 50))]
    pub invoice_date: Option<String>,
    #[validate(length(max = 100))]
    pub lr_number: Option<String>,
    #[validate(length(max = 200))]
    pub transporter_name: Option<String>,
    #[validate(length(max = 50))]
    pub transporter_number: Option<String>,
    #[validate(length(max = 100, message = "Complaint type must be at most 100 characters"))]
    pub complaint_type: Option<String>,
    #[validate(length(max = 5000, message = "Voice of customer must be at most 5000 characters"))]
    pub voc: Option<String>,
    #[validate(length(max = 200))]
    pub sales_person_name: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 200))]
    pub product_name: Option<String>,
    #[validate(length(max = 200))]
    pub area_of_concern: Option<String>,
    #[validate(length(max = 100))]
    pub sub_category: Option<String>,
    #[validate(length(max = 5000))]
    pub action_taken: Option<String>,
    #[validate(length(max = 50))]
    pub credit_date: Option<String>,
    #[validate(length(max = 100))]
    pub credit_note_number: Option<String>,
    #[validate(length(max = 50))]
    pub credit_amount: Option<String>,
    #[validate(length(max = 200))]
    pub person_responsible: Option<String>,
    #[validate(length(max = 5000))]
    pub root_cause_analysis: Option<String>,
    #[validate(length(max = 500))]
    pub final_status: Option<String>,
}

impl ComplaintFields {
    fn slots(&self) -> [Option<&str>; FIELD_COUNT] {
        [
            self.complaint_source.as_deref(),
            self.place_of_supply.as_deref(),
            self.complaint_receiving_location.as_deref(),
            self.depo_party_name.as_deref(),
            self.email.as_deref(),
            self.contact_number.as_deref(),
            self.invoice_no.as_deref(),
            self.invoice_date.as_deref(),
            self.lr_number.as_deref(),
            self.transporter_name.as_deref(),
            self.transporter_number.as_deref(),
            self.complaint_type.as_deref(),
            self.voc.as_deref(),
            self.sales_person_name.as_deref(),
            self.category.as_deref(),
            self.product_name.as_deref(),
            self.area_of_concern.as_deref(),
            self.sub_category.as_deref(),
            self.action_taken.as_deref(),
            self.credit_date.as_deref(),
            self.credit_note_number.as_deref(),
            self.credit_amount.as_deref(),
            self.person_responsible.as_deref(),
            self.root_cause_analysis.as_deref(),
            self.final_status.as_deref(),
        ]
    }

    /// Rejects required fields that are blank.
    ///
    /// With `all_present` set, a missing required field is also rejected
    /// (creation); otherwise only supplied values are checked (patches).
    pub fn check_required(&self, all_present: bool) -> Result<(), FieldError> {
        for (name, value) in FIELD_NAMES.iter().zip(self.slots()) {
            if !REQUIRED_FIELDS.contains(name) {
                continue;
            }
            match value {
                Some(v) if is_blank(v) => {
                    return Err(FieldError {
                        field: *name,
                        reason: "must not be blank",
                    })
                }
                None if all_present => {
                    return Err(FieldError {
                        field: *name,
                        reason: "is required",
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns true when no descriptive field is supplied.
    pub fn is_empty(&self) -> bool {
        self.slots().iter().all(Option::is_none)
    }
}

/// Complaint submission payload.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintDraft {
    #[serde(flatten)]
    #[validate(nested)]
    pub fields: ComplaintFields,

    #[serde(default)]
    pub priority: Option<Priority>,

    /// `YYYY-MM-DD`; blank means today.
    #[serde(default)]
    pub date: Option<String>,
}

impl ComplaintDraft {
    /// Normalizes the draft into a complaint ready for storage.
    ///
    /// `today` supplies the default date and the numbering period.
    pub fn into_new(self, user_id: i64, today: NaiveDate) -> Result<NewComplaint, FieldError> {
        self.fields.check_required(true)?;
        let date = parse_date(self.date.as_deref(), today)?;

        let mut details = ComplaintDetails::default();
        for slot in details.slots_mut() {
            *slot = PLACEHOLDER.to_string();
        }
        details.apply(&self.fields);

        Ok(NewComplaint {
            user_id,
            period: numbering_period(today),
            priority: self.priority.unwrap_or_default(),
            date,
            details,
        })
    }
}

/// Partial update of non-status fields.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintPatch {
    #[serde(flatten)]
    #[validate(nested)]
    pub fields: ComplaintFields,

    #[serde(default)]
    pub priority: Option<Priority>,

    #[serde(default)]
    pub date: Option<String>,
}

impl ComplaintPatch {
    /// Checks rules `validator` cannot express: required fields stay
    /// non-blank and `date` parses.
    pub fn check(&self) -> Result<(), FieldError> {
        self.fields.check_required(false)?;
        if let Some(date) = self.date.as_deref().filter(|d| !is_blank(d)) {
            parse_calendar_date(date)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.priority.is_none() && self.date.is_none()
    }
}

/// A validated, normalized complaint not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComplaint {
    pub user_id: i64,
    /// Numbering period, `YYMM`.
    pub period: String,
    pub priority: Priority,
    pub date: NaiveDate,
    pub details: ComplaintDetails,
}

/// A stored complaint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: i64,
    pub complaint_code: String,
    pub sequence_number: i32,
    pub user_id: i64,
    pub status: ComplaintStatus,
    pub priority: Priority,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub details: ComplaintDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Complaint {
    /// Applies a checked patch in place. Does not touch `status`.
    pub fn apply_patch(&mut self, patch: &ComplaintPatch, now: DateTime<Utc>) {
        self.details.apply(&patch.fields);
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(date) = patch
            .date
            .as_deref()
            .filter(|d| !is_blank(d))
            .and_then(|d| parse_calendar_date(d).ok())
        {
            self.date = date;
        }
        self.updated_at = now;
    }
}

/// Query filters for complaint listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintFilter {
    pub status: Option<ComplaintStatus>,
    pub priority: Option<Priority>,
    /// Case-insensitive match on code, party name, type or product.
    pub search: Option<String>,
    /// Restricts the listing to one owner. Set by the server, never by clients.
    #[serde(skip)]
    pub owner_id: Option<i64>,
}

impl ComplaintFilter {
    /// In-memory equivalent of the SQL filter.
    pub fn matches(&self, complaint: &Complaint) -> bool {
        if self.owner_id.is_some_and(|owner| owner != complaint.user_id) {
            return false;
        }
        if self.status.is_some_and(|s| s != complaint.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != complaint.priority) {
            return false;
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                [
                    &complaint.complaint_code,
                    &complaint.details.depo_party_name,
                    &complaint.details.complaint_type,
                    &complaint.details.product_name,
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&term))
            }
        }
    }
}

/// Complaint counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintStats {
    pub total: i64,
    pub new: i64,
    pub in_progress: i64,
    pub resolved: i64,
    pub closed: i64,
    /// Complaints currently resolved whose last update fell on the given day.
    pub resolved_today: i64,
}

impl ComplaintStats {
    /// Tallies one complaint.
    pub fn record(&mut self, complaint: &Complaint, today: NaiveDate) {
        self.total += 1;
        match complaint.status {
            ComplaintStatus::New => self.new += 1,
            ComplaintStatus::InProgress => self.in_progress += 1,
            ComplaintStatus::Resolved => {
                self.resolved += 1;
                if complaint.updated_at.date_naive() == today {
                    self.resolved_today += 1;
                }
            }
            ComplaintStatus::Closed => self.closed += 1,
        }
    }
}

/// Numbering period for a day, `YYMM`.
pub fn numbering_period(day: NaiveDate) -> String {
    format!("{:02}{:02}", day.year().rem_euclid(100), day.month())
}

/// Complaint code: the period followed by the serial, zero-padded to two digits.
///
/// ```
/// use domain::models::complaint::format_code;
///
/// assert_eq!(format_code("2510", 7), "251007");
/// assert_eq!(format_code("2510", 123), "2510123");
/// ```
pub fn format_code(period: &str, serial: i32) -> String {
    format!("{}{:02}", period, serial)
}

fn is_blank(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == PLACEHOLDER
}

fn normalize(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

fn parse_date(value: Option<&str>, today: NaiveDate) -> Result<NaiveDate, FieldError> {
    match value.filter(|v| !is_blank(v)) {
        None => Ok(today),
        Some(v) => parse_calendar_date(v),
    }
}

fn parse_calendar_date(value: &str) -> Result<NaiveDate, FieldError> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| FieldError {
            field: "date",
            reason: "must be a YYYY-MM-DD date",
        })
}

fn validate_optional_email(email: &str) -> Result<(), ValidationError> {
    if is_blank(email) || email.trim().validate_email() {
        Ok(())
    } else {
        let mut err = ValidationError::new("email");
        err.message = Some("Invalid email format".into());
        Err(err)
    }
}

fn validate_optional_contact_number(number: &str) -> Result<(), ValidationError> {
    if is_blank(number) {
        return Ok(());
    }
    shared::validation::validate_contact_number(number)
}
