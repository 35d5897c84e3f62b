//! `sea_orm` entity for the job registry table. Field whitelist and
//! indexing mirror `original_source/src/db/job_storage.py`'s schema.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub job_id: Uuid,
    #[sea_orm(indexed)]
    pub user_id: String,
    pub video_name: String,
    pub doc_id: Option<String>,
    #[sea_orm(indexed)]
    pub status: String,
    pub current_stage: Option<String>,
    pub stage_index: i32,
    pub total_stages: i32,
    pub started_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
    pub error: Option<String>,
    #[sea_orm(indexed)]
    pub seen: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
