//! Plan service against PostgreSQL.
//!
//! Covers the paths where the database, not the service, enforces the
//! rules: the unique (project, owner, name) key and the derived draft flag.

use uuid::Uuid;

use planhub_core::auth::{self, AuthContext};
use planhub_core::plan::{self, CreationPolicy, PlanDirs};
use planhub_core::token::{TokenConfig, generate_token};
use planhub_core::{ErrorKind, PlanError};
use planhub_db::models::{DRAFT_PLAN_NAME, OrgRole};
use planhub_db::queries::plans as plan_queries;
use planhub_test_utils::{Fixture, create_test_db, drop_test_db, seed_fixture};

async fn auth_for(pool: &sqlx::PgPool, fx: &Fixture) -> AuthContext {
    let tokens = TokenConfig::new(b"pg-test-secret".to_vec());
    let header = format!("Bearer {}", generate_token(&tokens, fx.user.id, fx.org.id));
    auth::authenticate(pool, &tokens, Some(&header))
        .await
        .expect("fixture user should authenticate")
}

#[tokio::test]
async fn create_resolves_names_against_database() {
    let (pool, db_name) = create_test_db().await;
    let tmp = tempfile::tempdir().unwrap();
    let dirs = PlanDirs::new(tmp.path());
    let fx = seed_fixture(&pool, OrgRole::Member, false).await;
    let auth = auth_for(&pool, &fx).await;

    let mut names = Vec::new();
    for _ in 0..3 {
        let p = plan::create_plan(&pool, &dirs, &auth, &fx.project, "migration")
            .await
            .unwrap();
        assert!(dirs.plan_dir(fx.org.id, p.id).is_dir());
        names.push(p.name);
    }
    assert_eq!(names, ["migration", "migration.2", "migration.3"]);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn draft_replacement_in_database() {
    let (pool, db_name) = create_test_db().await;
    let tmp = tempfile::tempdir().unwrap();
    let dirs = PlanDirs::new(tmp.path());
    let fx = seed_fixture(&pool, OrgRole::Member, false).await;
    let auth = auth_for(&pool, &fx).await;

    let first = plan::create_plan(&pool, &dirs, &auth, &fx.project, "")
        .await
        .unwrap();
    let second = plan::create_plan(&pool, &dirs, &auth, &fx.project, DRAFT_PLAN_NAME)
        .await
        .unwrap();

    assert!(second.is_draft);
    assert!(plan_queries::get_plan(&pool, first.id).await.unwrap().is_none());
    assert!(!dirs.plan_dir(fx.org.id, first.id).exists());
    assert_eq!(
        plan_queries::count_plans_by_name(&pool, fx.project.id, fx.user.id, DRAFT_PLAN_NAME)
            .await
            .unwrap(),
        1
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn trial_quota_reads_live_count() {
    let (pool, db_name) = create_test_db().await;
    let tmp = tempfile::tempdir().unwrap();
    let dirs = PlanDirs::new(tmp.path());
    let fx = seed_fixture(&pool, OrgRole::Member, true).await;
    let auth = auth_for(&pool, &fx).await;
    let policy = CreationPolicy {
        cloud_mode: true,
        trial_max_plans: 2,
    };

    for name in ["a", "b"] {
        let project = plan::authorize_plan_creation(&pool, &auth, &policy, fx.project.id)
            .await
            .unwrap();
        plan::create_plan(&pool, &dirs, &auth, &project, name)
            .await
            .unwrap();
    }

    let err = plan::authorize_plan_creation(&pool, &auth, &policy, fx.project.id)
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::TrialPlansExceeded { max_plans: 2 }));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn delete_twice_is_not_found() {
    let (pool, db_name) = create_test_db().await;
    let tmp = tempfile::tempdir().unwrap();
    let dirs = PlanDirs::new(tmp.path());
    let fx = seed_fixture(&pool, OrgRole::Member, false).await;
    let auth = auth_for(&pool, &fx).await;

    let p = plan::create_plan(&pool, &dirs, &auth, &fx.project, "once")
        .await
        .unwrap();
    plan::delete_plan(&pool, &dirs, &auth, p.id).await.unwrap();

    let err = plan::delete_plan(&pool, &dirs, &auth, p.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = plan::delete_plan(&pool, &dirs, &auth, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    pool.close().await;
    drop_test_db(&db_name).await;
}
