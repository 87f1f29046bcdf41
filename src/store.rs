//! Canteen Storage
//! SQLite persistence for meals, feedback and purchase requests

use crate::models::{
    Feedback, Meal, MealUpdate, NewFeedback, NewMeal, NewPurchaseRequest, PurchaseRequest,
    PurchaseStatus,
};
use anyhow::{Context, Result};
use chrono::{Local, Utc};
use parking_lot::Mutex;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const MEAL_COLUMNS: &str =
    "id, name, description, price, category, available_on, created_at, updated_at";
const FEEDBACK_COLUMNS: &str = "id, meal_id, author_id, rating, comment, created_at";
const REQUEST_COLUMNS: &str =
    "id, requester_id, item, quantity, unit, note, status, reviewed_by, created_at, updated_at";

pub fn today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

#[derive(Clone)]
pub struct CanteenStore {
    conn: Arc<Mutex<Connection>>,
}

impl CanteenStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open canteen db at {}", db_path))?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meals (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                price REAL NOT NULL,
                category TEXT,
                available_on TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_meals_available_on ON meals(available_on);

            CREATE TABLE IF NOT EXISTS feedback (
                id TEXT PRIMARY KEY,
                meal_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                rating INTEGER NOT NULL,
                comment TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_feedback_meal ON feedback(meal_id);

            CREATE TABLE IF NOT EXISTS purchase_requests (
                id TEXT PRIMARY KEY,
                requester_id TEXT NOT NULL,
                item TEXT NOT NULL,
                quantity REAL NOT NULL,
                unit TEXT NOT NULL,
                note TEXT,
                status TEXT NOT NULL,
                reviewed_by TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_purchase_requests_requester
                ON purchase_requests(requester_id);
            "#,
        )
        .context("Failed to create canteen tables")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ---------------------------------------------------------------- meals

    pub fn create_meal(&self, new: NewMeal) -> Result<Meal> {
        let now = Utc::now().to_rfc3339();
        let meal = Meal {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            price: new.price,
            category: new.category,
            available_on: new.available_on.unwrap_or_else(today),
            created_at: now.clone(),
            updated_at: now,
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO meals (id, name, description, price, category, available_on, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                meal.id.to_string(),
                meal.name,
                meal.description,
                meal.price,
                meal.category,
                meal.available_on,
                meal.created_at,
                meal.updated_at,
            ],
        )
        .context("Failed to insert meal")?;

        info!(meal_id = %meal.id, name = %meal.name, "Created meal");
        Ok(meal)
    }

    pub fn get_meal(&self, id: &Uuid) -> Result<Option<Meal>> {
        let conn = self.conn.lock();
        let meal = conn
            .query_row(
                &format!("SELECT {} FROM meals WHERE id = ?1", MEAL_COLUMNS),
                params![id.to_string()],
                meal_from_row,
            )
            .optional()?;
        Ok(meal)
    }

    pub fn list_meals(&self) -> Result<Vec<Meal>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM meals ORDER BY available_on DESC, name",
            MEAL_COLUMNS
        ))?;
        let meals = stmt
            .query_map([], meal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meals)
    }

    pub fn list_meals_on(&self, date: &str) -> Result<Vec<Meal>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM meals WHERE available_on = ?1 ORDER BY name",
            MEAL_COLUMNS
        ))?;
        let meals = stmt
            .query_map(params![date], meal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meals)
    }

    /// Apply the set fields of `update`. Returns `None` for an unknown meal.
    pub fn update_meal(&self, id: &Uuid, update: MealUpdate) -> Result<Option<Meal>> {
        let Some(mut meal) = self.get_meal(id)? else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            meal.name = name;
        }
        if update.description.is_some() {
            meal.description = update.description;
        }
        if let Some(price) = update.price {
            meal.price = price;
        }
        if update.category.is_some() {
            meal.category = update.category;
        }
        if let Some(available_on) = update.available_on {
            meal.available_on = available_on;
        }
        meal.updated_at = Utc::now().to_rfc3339();

        let conn = self.conn.lock();
        conn.execute(
            "UPDATE meals SET name = ?1, description = ?2, price = ?3, category = ?4,
                 available_on = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                meal.name,
                meal.description,
                meal.price,
                meal.category,
                meal.available_on,
                meal.updated_at,
                meal.id.to_string(),
            ],
        )
        .context("Failed to update meal")?;

        Ok(Some(meal))
    }

    /// Delete a meal and its feedback. Returns false for an unknown meal.
    pub fn delete_meal(&self, id: &Uuid) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM feedback WHERE meal_id = ?1",
            params![id.to_string()],
        )?;
        let rows = tx.execute("DELETE FROM meals WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;

        if rows > 0 {
            info!(meal_id = %id, "Deleted meal");
        }
        Ok(rows > 0)
    }

    // ------------------------------------------------------------- feedback

    /// Store feedback for an existing meal. Returns `None` when the meal is unknown.
    pub fn create_feedback(&self, author_id: &str, new: NewFeedback) -> Result<Option<Feedback>> {
        let feedback = Feedback {
            id: Uuid::new_v4(),
            meal_id: new.meal_id,
            author_id: author_id.to_string(),
            rating: new.rating,
            comment: new.comment,
            created_at: Utc::now().to_rfc3339(),
        };

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        // Existence check and insert share one transaction
        let meal_exists = tx
            .query_row(
                "SELECT 1 FROM meals WHERE id = ?1",
                params![feedback.meal_id.to_string()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !meal_exists {
            return Ok(None);
        }

        tx.execute(
            "INSERT INTO feedback (id, meal_id, author_id, rating, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                feedback.id.to_string(),
                feedback.meal_id.to_string(),
                feedback.author_id,
                feedback.rating,
                feedback.comment,
                feedback.created_at,
            ],
        )
        .context("Failed to insert feedback")?;
        tx.commit()?;

        Ok(Some(feedback))
    }

    pub fn get_feedback(&self, id: &Uuid) -> Result<Option<Feedback>> {
        let conn = self.conn.lock();
        let feedback = conn
            .query_row(
                &format!("SELECT {} FROM feedback WHERE id = ?1", FEEDBACK_COLUMNS),
                params![id.to_string()],
                feedback_from_row,
            )
            .optional()?;
        Ok(feedback)
    }

    pub fn list_feedback_for_meal(&self, meal_id: &Uuid) -> Result<Vec<Feedback>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM feedback WHERE meal_id = ?1 ORDER BY created_at DESC",
            FEEDBACK_COLUMNS
        ))?;
        let feedback = stmt
            .query_map(params![meal_id.to_string()], feedback_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(feedback)
    }

    pub fn delete_feedback(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM feedback WHERE id = ?1", params![id.to_string()])?;
        Ok(rows > 0)
    }

    // ---------------------------------------------------- purchase requests

    pub fn create_purchase_request(
        &self,
        requester_id: &str,
        new: NewPurchaseRequest,
    ) -> Result<PurchaseRequest> {
        let now = Utc::now().to_rfc3339();
        let request = PurchaseRequest {
            id: Uuid::new_v4(),
            requester_id: requester_id.to_string(),
            item: new.item,
            quantity: new.quantity,
            unit: new.unit,
            note: new.note,
            status: PurchaseStatus::Pending,
            reviewed_by: None,
            created_at: now.clone(),
            updated_at: now,
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO purchase_requests
                 (id, requester_id, item, quantity, unit, note, status, reviewed_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                request.id.to_string(),
                request.requester_id,
                request.item,
                request.quantity,
                request.unit,
                request.note,
                request.status.as_str(),
                request.reviewed_by,
                request.created_at,
                request.updated_at,
            ],
        )
        .context("Failed to insert purchase request")?;

        info!(request_id = %request.id, item = %request.item, "Created purchase request");
        Ok(request)
    }

    pub fn list_purchase_requests(&self, requester_id: Option<&str>) -> Result<Vec<PurchaseRequest>> {
        let conn = self.conn.lock();
        let requests = match requester_id {
            Some(requester) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM purchase_requests WHERE requester_id = ?1 ORDER BY created_at DESC",
                    REQUEST_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![requester], request_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM purchase_requests ORDER BY created_at DESC",
                    REQUEST_COLUMNS
                ))?;
                let rows = stmt
                    .query_map([], request_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(requests)
    }

    /// Record a review decision. Returns `None` for an unknown request.
    pub fn set_purchase_status(
        &self,
        id: &Uuid,
        status: PurchaseStatus,
        reviewer_id: &str,
    ) -> Result<Option<PurchaseRequest>> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE purchase_requests SET status = ?1, reviewed_by = ?2, updated_at = ?3
             WHERE id = ?4",
            params![status.as_str(), reviewer_id, now, id.to_string()],
        )?;
        if rows == 0 {
            return Ok(None);
        }

        info!(request_id = %id, status = status.as_str(), reviewer = reviewer_id, "Purchase request reviewed");

        let request = conn
            .query_row(
                &format!("SELECT {} FROM purchase_requests WHERE id = ?1", REQUEST_COLUMNS),
                params![id.to_string()],
                request_from_row,
            )
            .optional()?;
        Ok(request)
    }
}

fn parse_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn meal_from_row(row: &Row<'_>) -> rusqlite::Result<Meal> {
    Ok(Meal {
        id: parse_uuid(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        category: row.get(4)?,
        available_on: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn feedback_from_row(row: &Row<'_>) -> rusqlite::Result<Feedback> {
    Ok(Feedback {
        id: parse_uuid(row, 0)?,
        meal_id: parse_uuid(row, 1)?,
        author_id: row.get(2)?,
        rating: row.get(3)?,
        comment: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<PurchaseRequest> {
    let status: String = row.get(6)?;
    Ok(PurchaseRequest {
        id: parse_uuid(row, 0)?,
        requester_id: row.get(1)?,
        item: row.get(2)?,
        quantity: row.get(3)?,
        unit: row.get(4)?,
        note: row.get(5)?,
        status: PurchaseStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                Type::Text,
                format!("unknown status {:?}", status).into(),
            )
        })?,
        reviewed_by: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CanteenStore {
        CanteenStore::in_memory().unwrap()
    }

    fn borscht(date: Option<&str>) -> NewMeal {
        NewMeal {
            name: "Borscht".to_string(),
            description: Some("Beetroot soup".to_string()),
            price: 95.0,
            category: Some("lunch".to_string()),
            available_on: date.map(str::to_string),
        }
    }

    #[test]
    fn test_meal_crud() {
        let store = store();
        let meal = store.create_meal(borscht(None)).unwrap();
        assert_eq!(meal.available_on, today());

        let fetched = store.get_meal(&meal.id).unwrap().unwrap();
        assert_eq!(fetched, meal);

        let updated = store
            .update_meal(
                &meal.id,
                MealUpdate {
                    price: Some(110.0),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.price, 110.0);
        assert_eq!(updated.name, "Borscht");
        assert_eq!(store.get_meal(&meal.id).unwrap().unwrap().price, 110.0);

        assert!(store.delete_meal(&meal.id).unwrap());
        assert!(store.get_meal(&meal.id).unwrap().is_none());
        assert!(!store.delete_meal(&meal.id).unwrap());
        assert!(store
            .update_meal(&meal.id, MealUpdate::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_meals_by_date() {
        let store = store();
        store.create_meal(borscht(Some("2025-09-01"))).unwrap();
        store.create_meal(borscht(Some("2025-09-02"))).unwrap();
        store.create_meal(borscht(None)).unwrap();

        assert_eq!(store.list_meals().unwrap().len(), 3);
        assert_eq!(store.list_meals_on("2025-09-01").unwrap().len(), 1);
        assert_eq!(store.list_meals_on(&today()).unwrap().len(), 1);
    }

    #[test]
    fn test_feedback_lifecycle() {
        let store = store();
        let meal = store.create_meal(borscht(None)).unwrap();

        let feedback = store
            .create_feedback(
                "student-1",
                NewFeedback {
                    meal_id: meal.id,
                    rating: 5,
                    comment: Some("Tasty".to_string()),
                },
            )
            .unwrap()
            .unwrap();

        let listed = store.list_feedback_for_meal(&meal.id).unwrap();
        assert_eq!(listed, vec![feedback.clone()]);
        assert_eq!(store.get_feedback(&feedback.id).unwrap().unwrap().rating, 5);

        assert!(store.delete_feedback(&feedback.id).unwrap());
        assert!(store.list_feedback_for_meal(&meal.id).unwrap().is_empty());
    }

    #[test]
    fn test_deleting_meal_drops_feedback() {
        let store = store();
        let meal = store.create_meal(borscht(None)).unwrap();
        let feedback = store
            .create_feedback(
                "student-1",
                NewFeedback {
                    meal_id: meal.id,
                    rating: 3,
                    comment: None,
                },
            )
            .unwrap()
            .unwrap();

        store.delete_meal(&meal.id).unwrap();
        assert!(store.get_feedback(&feedback.id).unwrap().is_none());
    }

    #[test]
    fn test_feedback_for_unknown_meal_not_stored() {
        let store = store();
        let meal = store.create_meal(borscht(None)).unwrap();
        store.delete_meal(&meal.id).unwrap();

        let stored = store
            .create_feedback(
                "student-1",
                NewFeedback {
                    meal_id: meal.id,
                    rating: 4,
                    comment: None,
                },
            )
            .unwrap();

        assert!(stored.is_none());
        assert!(store.list_feedback_for_meal(&meal.id).unwrap().is_empty());
    }

    #[test]
    fn test_purchase_request_review() {
        let store = store();
        let new = || NewPurchaseRequest {
            item: "Potatoes".to_string(),
            quantity: 50.0,
            unit: "kg".to_string(),
            note: None,
        };
        let mine = store.create_purchase_request("cook-1", new()).unwrap();
        store.create_purchase_request("cook-2", new()).unwrap();

        assert_eq!(mine.status, PurchaseStatus::Pending);
        assert_eq!(store.list_purchase_requests(Some("cook-1")).unwrap().len(), 1);
        assert_eq!(store.list_purchase_requests(None).unwrap().len(), 2);

        let reviewed = store
            .set_purchase_status(&mine.id, PurchaseStatus::Approved, "admin-1")
            .unwrap()
            .unwrap();
        assert_eq!(reviewed.status, PurchaseStatus::Approved);
        assert_eq!(reviewed.reviewed_by.as_deref(), Some("admin-1"));

        assert!(store
            .set_purchase_status(&Uuid::new_v4(), PurchaseStatus::Rejected, "admin-1")
            .unwrap()
            .is_none());
    }
}
