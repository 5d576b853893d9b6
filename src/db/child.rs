use chrono::Utc;
use color_eyre::Result;
use ulid::Ulid;

use super::models::{ChildModel, NewChild};
use super::Db;

const CHILD_COLUMNS: &str =
    "id, parent_id, name, grade_level, birth_year, created_at, is_active";

impl Db {
    pub async fn create_child(&self, child: NewChild) -> Result<ChildModel> {
        let id = Ulid::new().to_string();

        let created = sqlx::query_as::<_, ChildModel>(&format!(
            "INSERT INTO child_profiles (id, parent_id, name, grade_level, birth_year, created_at, is_active) \
             VALUES (?, ?, ?, ?, ?, ?, 1) RETURNING {CHILD_COLUMNS}"
        ))
        .bind(&id)
        .bind(&child.parent_id)
        .bind(&child.name)
        .bind(child.grade_level)
        .bind(child.birth_year)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(child_id = %id, parent_id = %child.parent_id, "child profile created");
        Ok(created)
    }

    pub async fn get_child(&self, child_id: &str) -> Result<Option<ChildModel>> {
        let child = sqlx::query_as::<_, ChildModel>(&format!(
            "SELECT {CHILD_COLUMNS} FROM child_profiles WHERE id = ? AND is_active = 1"
        ))
        .bind(child_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(child)
    }

    pub async fn children_for_parent(&self, parent_id: &str) -> Result<Vec<ChildModel>> {
        let children = sqlx::query_as::<_, ChildModel>(&format!(
            "SELECT {CHILD_COLUMNS} FROM child_profiles \
             WHERE parent_id = ? AND is_active = 1 ORDER BY created_at, id"
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(children)
    }
}
