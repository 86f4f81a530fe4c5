//! Complaint and complaint history entities (database row mappings).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::complaint::{
    Complaint, ComplaintDetails, ComplaintStats, ComplaintStatus, Priority,
};
use domain::models::history::ComplaintHistory;
use domain::StoreError;
use sqlx::FromRow;

use crate::error::corrupt_row;

/// Descriptive columns, in the order [`detail_values`] yields them.
pub const DETAIL_COLUMNS: [&str; 25] = [
    "complaint_source",
    "place_of_supply",
    "complaint_receiving_location",
    "depo_party_name",
    "email",
    "contact_number",
    "invoice_no",
    "invoice_date",
    "lr_number",
    "transporter_name",
    "transporter_number",
    "complaint_type",
    "voc",
    "sales_person_name",
    "category",
    "product_name",
    "area_of_concern",
    "sub_category",
    "action_taken",
    "credit_date",
    "credit_note_number",
    "credit_amount",
    "person_responsible",
    "root_cause_analysis",
    "final_status",
];

/// Full column list for `SELECT`/`RETURNING`.
pub fn complaint_columns() -> String {
    format!(
        "id, complaint_code, sequence_number, user_id, status, priority, complaint_date, {}, created_at, updated_at",
        DETAIL_COLUMNS.join(", ")
    )
}

/// Database row mapping for the complaints table.
#[derive(Debug, Clone, FromRow)]
pub struct ComplaintEntity {
    pub id: i64,
    pub complaint_code: String,
    pub sequence_number: i32,
    pub user_id: i64,
    pub status: String,
    pub priority: String,
    pub complaint_date: NaiveDate,
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
    pub final_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Descriptive values in [`DETAIL_COLUMNS`] order, for binding.
pub fn detail_values(details: &ComplaintDetails) -> [&str; 25] {
    [
        details.complaint_source.as_str(),
        details.place_of_supply.as_str(),
        details.complaint_receiving_location.as_str(),
        details.depo_party_name.as_str(),
        details.email.as_str(),
        details.contact_number.as_str(),
        details.invoice_no.as_str(),
        details.invoice_date.as_str(),
        details.lr_number.as_str(),
        details.transporter_name.as_str(),
        details.transporter_number.as_str(),
        details.complaint_type.as_str(),
        details.voc.as_str(),
        details.sales_person_name.as_str(),
        details.category.as_str(),
        details.product_name.as_str(),
        details.area_of_concern.as_str(),
        details.sub_category.as_str(),
        details.action_taken.as_str(),
        details.credit_date.as_str(),
        details.credit_note_number.as_str(),
        details.credit_amount.as_str(),
        details.person_responsible.as_str(),
        details.root_cause_analysis.as_str(),
        details.final_status.as_str(),
    ]
}

impl TryFrom<ComplaintEntity> for Complaint {
    type Error = StoreError;

    fn try_from(entity: ComplaintEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            complaint_code: entity.complaint_code,
            sequence_number: entity.sequence_number,
            user_id: entity.user_id,
            status: entity.status.parse::<ComplaintStatus>().map_err(corrupt_row)?,
            priority: entity.priority.parse::<Priority>().map_err(corrupt_row)?,
            date: entity.complaint_date,
            details: ComplaintDetails {
                complaint_source: entity.complaint_source,
                place_of_supply: entity.place_of_supply,
                complaint_receiving_location: entity.complaint_receiving_location,
                depo_party_name: entity.depo_party_name,
                email: entity.email,
                contact_number: entity.contact_number,
                invoice_no: entity.invoice_no,
                invoice_date: entity.invoice_date,
                lr_number: entity.lr_number,
                transporter_name: entity.transporter_name,
                transporter_number: entity.transporter_number,
                complaint_type: entity.complaint_type,
                voc: entity.voc,
                sales_person_name: entity.sales_person_name,
                category: entity.category,
                product_name: entity.product_name,
                area_of_concern: entity.area_of_concern,
                sub_category: entity.sub_category,
                action_taken: entity.action_taken,
                credit_date: entity.credit_date,
                credit_note_number: entity.credit_note_number,
                credit_amount: entity.credit_amount,
                person_responsible: entity.person_responsible,
                root_cause_analysis: entity.root_cause_analysis,
                final_status: entity.final_status,
            },
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

/// Database row mapping for the complaint_history table.
#[derive(Debug, Clone, FromRow)]
pub struct ComplaintHistoryEntity {
    pub id: i64,
    pub complaint_id: i64,
    pub previous_status: Option<String>,
    pub new_status: String,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
}

impl TryFrom<ComplaintHistoryEntity> for ComplaintHistory {
    type Error = StoreError;

    fn try_from(entity: ComplaintHistoryEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            complaint_id: entity.complaint_id,
            previous_status: entity
                .previous_status
                .map(|s| s.parse::<ComplaintStatus>())
                .transpose()
                .map_err(corrupt_row)?,
            new_status: entity.new_status.parse().map_err(corrupt_row)?,
            changed_by: entity.changed_by,
            changed_at: entity.changed_at,
        })
    }
}

/// Aggregate row for status counts.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct ComplaintStatsEntity {
    pub total: i64,
    pub new: i64,
    pub in_progress: i64,
    pub resolved: i64,
    pub closed: i64,
    pub resolved_today: i64,
}

impl From<ComplaintStatsEntity> for ComplaintStats {
    fn from(entity: ComplaintStatsEntity) -> Self {
        Self {
            total: entity.total,
            new: entity.new,
            in_progress: entity.in_progress,
            resolved: entity.resolved,
            closed: entity.closed,
            resolved_today: entity.resolved_today,
        }
    }
}
