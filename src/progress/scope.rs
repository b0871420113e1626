// src/progress/scope.rs

use sqlx::PgPool;

use crate::error::AppError;

/// All quiz ids reachable under a course, grouped by attachment scope.
#[derive(Debug, Default, Clone)]
pub struct CourseQuizzes {
    pub course_level: Vec<i64>,
    pub module_level: Vec<i64>,
    pub lesson_level: Vec<i64>,
}

impl CourseQuizzes {
    /// Every quiz id across all three scopes.
    pub fn all(&self) -> Vec<i64> {
        let mut ids = Vec::with_capacity(self.total());
        ids.extend_from_slice(&self.course_level);
        ids.extend_from_slice(&self.module_level);
        ids.extend_from_slice(&self.lesson_level);
        ids
    }

    pub fn total(&self) -> usize {
        self.course_level.len() + self.module_level.len() + self.lesson_level.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Enumerates the quizzes attached under a course at course, module and
/// lesson level.
///
/// A quiz references exactly one scope, so the three sets are disjoint.
/// Learner-facing computations pass `published_only = true`; unpublished
/// quizzes are only visible to the owning instructor and admins.
///
/// A missing course (or one without modules/lessons) resolves to empty sets
/// rather than an error; validating course existence is the caller's job.
pub async fn resolve_quiz_ids(
    pool: &PgPool,
    course_id: i64,
    published_only: bool,
) -> Result<CourseQuizzes, AppError> {
    let course_level = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM quizzes
         WHERE course_id = $1 AND module_id IS NULL AND lesson_id IS NULL
           AND (is_published OR NOT $2)
         ORDER BY id",
    )
    .bind(course_id)
    .bind(published_only)
    .fetch_all(pool)
    .await?;

    let module_level = sqlx::query_scalar::<_, i64>(
        "SELECT q.id FROM quizzes q
         JOIN course_modules m ON q.module_id = m.id
         WHERE m.course_id = $1 AND q.lesson_id IS NULL
           AND (q.is_published OR NOT $2)
         ORDER BY q.id",
    )
    .bind(course_id)
    .bind(published_only)
    .fetch_all(pool)
    .await?;

    let lesson_level = sqlx::query_scalar::<_, i64>(
        "SELECT q.id FROM quizzes q
         JOIN lessons l ON q.lesson_id = l.id
         JOIN course_modules m ON l.module_id = m.id
         WHERE m.course_id = $1
           AND (q.is_published OR NOT $2)
         ORDER BY q.id",
    )
    .bind(course_id)
    .bind(published_only)
    .fetch_all(pool)
    .await?;

    Ok(CourseQuizzes {
        course_level,
        module_level,
        lesson_level,
    })
}

/// Walks a scope reference triple up to the owning course:
/// course ref directly, module ref via the module row, lesson ref via
/// lesson -> module. None when the referenced row no longer exists.
pub async fn scope_course_id(
    pool: &PgPool,
    course_ref: Option<i64>,
    module_ref: Option<i64>,
    lesson_ref: Option<i64>,
) -> Result<Option<i64>, AppError> {
    if let Some(course_id) = course_ref {
        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(pool)
            .await?;
        return Ok(exists);
    }

    if let Some(module_id) = module_ref {
        let course_id =
            sqlx::query_scalar::<_, i64>("SELECT course_id FROM course_modules WHERE id = $1")
                .bind(module_id)
                .fetch_optional(pool)
                .await?;
        return Ok(course_id);
    }

    if let Some(lesson_id) = lesson_ref {
        let course_id = sqlx::query_scalar::<_, i64>(
            "SELECT m.course_id FROM lessons l
             JOIN course_modules m ON l.module_id = m.id
             WHERE l.id = $1",
        )
        .bind(lesson_id)
        .fetch_optional(pool)
        .await?;
        return Ok(course_id);
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_concatenates_every_scope() {
        let scope = CourseQuizzes {
            course_level: vec![1],
            module_level: vec![2, 3],
            lesson_level: vec![4],
        };
        assert_eq!(scope.all(), vec![1, 2, 3, 4]);
        assert_eq!(scope.total(), 4);
        assert!(!scope.is_empty());
    }

    #[test]
    fn empty_scope_reports_empty() {
        assert!(CourseQuizzes::default().is_empty());
    }
}
