use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::*;
use crate::preparer::DistractorSource;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS words (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL UNIQUE,
                ipa TEXT,
                meaning TEXT,
                example TEXT,
                ipa_mistakes TEXT NOT NULL DEFAULT '[]',
                prepositions TEXT NOT NULL DEFAULT '[]',
                family TEXT,
                paraphrases TEXT NOT NULL DEFAULT '[]',
                collocations TEXT NOT NULL DEFAULT '[]',
                idioms TEXT NOT NULL DEFAULT '[]',
                irregular_forms TEXT,
                quality TEXT NOT NULL DEFAULT 'raw',
                unit_id TEXT,
                creation_date TEXT NOT NULL,
                last_grade TEXT,
                last_review TEXT,
                next_review TEXT,
                interval_days REAL NOT NULL DEFAULT 0.0,
                history TEXT NOT NULL DEFAULT '{}'
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS units (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Word operations

    pub async fn create_word(&self, request: CreateWordRequest) -> Result<Word> {
        let mut word = Word::new(request.text);
        word.meaning = request.meaning;
        word.unit_id = request.unit_id;

        self.insert_word(&word).await?;
        Ok(word)
    }

    async fn insert_word(&self, word: &Word) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO words (id, text, ipa, meaning, example, ipa_mistakes, prepositions,
                               family, paraphrases, collocations, idioms, irregular_forms,
                               quality, unit_id, creation_date, last_grade, last_review,
                               next_review, interval_days, history)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
            "#,
        )
        .bind(word.id.to_string())
        .bind(&word.text)
        .bind(&word.ipa)
        .bind(&word.meaning)
        .bind(&word.example)
        .bind(serde_json::to_string(&word.ipa_mistakes)?)
        .bind(serde_json::to_string(&word.prepositions)?)
        .bind(word.family.as_ref().map(serde_json::to_string).transpose()?)
        .bind(serde_json::to_string(&word.paraphrases)?)
        .bind(serde_json::to_string(&word.collocations)?)
        .bind(serde_json::to_string(&word.idioms)?)
        .bind(word.irregular_forms.as_ref().map(serde_json::to_string).transpose()?)
        .bind(quality_to_str(word.quality))
        .bind(word.unit_id.map(|u| u.to_string()))
        .bind(word.creation_date.to_rfc3339())
        .bind(word.last_grade.map(grade_to_str))
        .bind(word.last_review.map(|d| d.to_rfc3339()))
        .bind(word.next_review.map(|d| d.to_rfc3339()))
        .bind(word.interval_days)
        .bind(serde_json::to_string(&word.history)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_word(&self, id: Uuid) -> Result<Option<Word>> {
        let row = sqlx::query("SELECT * FROM words WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_word).transpose()
    }

    pub async fn find_word_by_text(&self, text: &str) -> Result<Option<Word>> {
        let row = sqlx::query("SELECT * FROM words WHERE text = ?1 COLLATE NOCASE")
            .bind(text)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_word).transpose()
    }

    pub async fn get_all_words(&self) -> Result<Vec<Word>> {
        let rows = sqlx::query("SELECT * FROM words ORDER BY creation_date DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_word).collect()
    }

    pub async fn get_words_paged(&self, limit: i64, offset: i64) -> Result<Vec<Word>> {
        let rows = sqlx::query(
            "SELECT * FROM words ORDER BY creation_date DESC LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_word).collect()
    }

    pub async fn search_words(&self, query: &str) -> Result<Vec<Word>> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(
            "SELECT * FROM words WHERE text LIKE ?1 OR meaning LIKE ?1 ORDER BY text",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_word).collect()
    }

    pub async fn get_words_due_for_review(&self) -> Result<Vec<Word>> {
        let now = Utc::now().to_rfc3339();
        let rows = sqlx::query(
            "SELECT * FROM words WHERE next_review IS NULL OR next_review <= ?1
             ORDER BY next_review ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_word).collect()
    }

    /// Full-row update; the word must already exist.
    pub async fn save_word(&self, word: &Word) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE words
            SET text = ?2, ipa = ?3, meaning = ?4, example = ?5, ipa_mistakes = ?6,
                prepositions = ?7, family = ?8, paraphrases = ?9, collocations = ?10,
                idioms = ?11, irregular_forms = ?12, quality = ?13, unit_id = ?14,
                last_grade = ?15, last_review = ?16, next_review = ?17,
                interval_days = ?18, history = ?19
            WHERE id = ?1
            "#,
        )
        .bind(word.id.to_string())
        .bind(&word.text)
        .bind(&word.ipa)
        .bind(&word.meaning)
        .bind(&word.example)
        .bind(serde_json::to_string(&word.ipa_mistakes)?)
        .bind(serde_json::to_string(&word.prepositions)?)
        .bind(word.family.as_ref().map(serde_json::to_string).transpose()?)
        .bind(serde_json::to_string(&word.paraphrases)?)
        .bind(serde_json::to_string(&word.collocations)?)
        .bind(serde_json::to_string(&word.idioms)?)
        .bind(word.irregular_forms.as_ref().map(serde_json::to_string).transpose()?)
        .bind(quality_to_str(word.quality))
        .bind(word.unit_id.map(|u| u.to_string()))
        .bind(word.last_grade.map(grade_to_str))
        .bind(word.last_review.map(|d| d.to_rfc3339()))
        .bind(word.next_review.map(|d| d.to_rfc3339()))
        .bind(word.interval_days)
        .bind(serde_json::to_string(&word.history)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn bulk_save_words(&self, words: &[Word]) -> Result<()> {
        for word in words {
            if self.get_word(word.id).await?.is_some() {
                self.save_word(word).await?;
            } else {
                self.insert_word(word).await?;
            }
        }
        Ok(())
    }

    /// Narrow update touching only review-state columns.
    pub async fn update_word_after_review(&self, word: &Word) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE words
            SET last_grade = ?2, last_review = ?3, next_review = ?4,
                interval_days = ?5, history = ?6
            WHERE id = ?1
            "#,
        )
        .bind(word.id.to_string())
        .bind(word.last_grade.map(grade_to_str))
        .bind(word.last_review.map(|d| d.to_rfc3339()))
        .bind(word.next_review.map(|d| d.to_rfc3339()))
        .bind(word.interval_days)
        .bind(serde_json::to_string(&word.history)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_word(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM words WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Random distractor meanings drawn from other words.
    pub async fn get_random_meanings(&self, exclude: Uuid, count: usize) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT meaning FROM words
             WHERE id != ?1 AND meaning IS NOT NULL AND meaning != ''
             ORDER BY RANDOM() LIMIT ?2",
        )
        .bind(exclude.to_string())
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.get("meaning")).collect())
    }

    // Unit operations

    pub async fn save_unit(&self, name: String, description: Option<String>) -> Result<Unit> {
        let unit = Unit {
            id: Uuid::new_v4(),
            name,
            description,
        };
        sqlx::query("INSERT INTO units (id, name, description) VALUES (?1, ?2, ?3)")
            .bind(unit.id.to_string())
            .bind(&unit.name)
            .bind(&unit.description)
            .execute(&self.pool)
            .await?;
        Ok(unit)
    }

    pub async fn get_all_units(&self) -> Result<Vec<Unit>> {
        let rows = sqlx::query("SELECT * FROM units ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        let mut units = Vec::new();
        for row in rows {
            units.push(Unit {
                id: Uuid::parse_str(&row.get::<String, _>("id"))?,
                name: row.get("name"),
                description: row.get("description"),
            });
        }
        Ok(units)
    }

    /// Deleting a unit detaches its words instead of removing them.
    pub async fn delete_unit(&self, id: Uuid) -> Result<bool> {
        sqlx::query("UPDATE words SET unit_id = NULL WHERE unit_id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        let result = sqlx::query("DELETE FROM units WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DistractorSource for Database {
    async fn random_meanings(&self, exclude: Uuid, count: usize) -> Result<Vec<String>> {
        self.get_random_meanings(exclude, count).await
    }
}

fn quality_to_str(quality: WordQuality) -> &'static str {
    match quality {
        WordQuality::Raw => "raw",
        WordQuality::Refined => "refined",
        WordQuality::Verified => "verified",
        WordQuality::Failed => "failed",
    }
}

fn quality_from_str(s: &str) -> WordQuality {
    match s {
        "refined" => WordQuality::Refined,
        "verified" => WordQuality::Verified,
        "failed" => WordQuality::Failed,
        _ => WordQuality::Raw,
    }
}

fn grade_to_str(grade: ReviewGrade) -> &'static str {
    match grade {
        ReviewGrade::Forgot => "forgot",
        ReviewGrade::Hard => "hard",
        ReviewGrade::Easy => "easy",
        ReviewGrade::Learned => "learned",
    }
}

fn grade_from_str(s: &str) -> Option<ReviewGrade> {
    match s {
        "forgot" => Some(ReviewGrade::Forgot),
        "hard" => Some(ReviewGrade::Hard),
        "easy" => Some(ReviewGrade::Easy),
        "learned" => Some(ReviewGrade::Learned),
        _ => None,
    }
}

fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

fn row_to_word(row: sqlx::sqlite::SqliteRow) -> Result<Word> {
    Ok(Word {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        text: row.get("text"),
        ipa: row.get("ipa"),
        meaning: row.get("meaning"),
        example: row.get("example"),
        ipa_mistakes: serde_json::from_str(&row.get::<String, _>("ipa_mistakes"))?,
        prepositions: serde_json::from_str(&row.get::<String, _>("prepositions"))?,
        family: row
            .get::<Option<String>, _>("family")
            .map(|s| serde_json::from_str(&s))
            .transpose()?,
        paraphrases: serde_json::from_str(&row.get::<String, _>("paraphrases"))?,
        collocations: serde_json::from_str(&row.get::<String, _>("collocations"))?,
        idioms: serde_json::from_str(&row.get::<String, _>("idioms"))?,
        irregular_forms: row
            .get::<Option<String>, _>("irregular_forms")
            .map(|s| serde_json::from_str(&s))
            .transpose()?,
        quality: quality_from_str(&row.get::<String, _>("quality")),
        unit_id: row
            .get::<Option<String>, _>("unit_id")
            .and_then(|s| Uuid::parse_str(&s).ok()),
        creation_date: DateTime::parse_from_rfc3339(&row.get::<String, _>("creation_date"))?
            .with_timezone(&Utc),
        last_grade: row
            .get::<Option<String>, _>("last_grade")
            .as_deref()
            .and_then(grade_from_str),
        last_review: parse_timestamp(row.get("last_review")),
        next_review: parse_timestamp(row.get("next_review")),
        interval_days: row.get("interval_days"),
        history: serde_json::from_str(&row.get::<String, _>("history")).unwrap_or_default(),
    })
}
