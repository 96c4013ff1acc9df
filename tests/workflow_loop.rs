//! Actor-critic loop: guards, gateway fallback, revision ceiling

mod common;

use async_trait::async_trait;
use common::{engine, project, quiet_engine, scratch_store, think, CTX};
use std::time::Duration;
use thoughtloop::{
    ArtifactRef, EngineConfig, GatewayError, GraphStore, MockReviewer, MockSummarizer,
    ReviewOutcome, ReviewRequest, ReviewerGateway, Role, Verdict, WorkflowError,
};

fn review_config() -> EngineConfig {
    EngineConfig::new()
        .without_review_cadence()
        .with_summary_threshold(usize::MAX)
}

#[tokio::test]
async fn drafting_returns_actor_node_when_policy_is_silent() {
    let (_dir, store) = scratch_store();
    let engine = quiet_engine(store);

    let outcome = engine.actor_think(think("quiet step")).await.unwrap();
    assert!(outcome.review.is_none());
    assert_eq!(outcome.actor.role, Role::Actor);
    assert!(outcome.actor.created_at.is_some());
}

#[tokio::test]
async fn done_signal_triggers_immediate_review() {
    let (_dir, store) = scratch_store();
    let workflow = engine(
        store,
        MockReviewer::approving(),
        MockSummarizer::fixed("unused"),
        review_config(),
    );

    let outcome = workflow
        .actor_think(think("finished the parser").done())
        .await
        .unwrap();
    let critic = outcome.review.expect("done signal should trigger review");
    assert_eq!(critic.role, Role::Critic);
    assert_eq!(critic.verdict, Some(Verdict::Approved));
    assert_eq!(critic.target, Some(outcome.actor.id));
    assert_eq!(critic.parents, vec![outcome.actor.id]);
}

#[tokio::test]
async fn cadence_reviews_every_second_node() {
    let (_dir, store) = scratch_store();
    let workflow = engine(
        store,
        MockReviewer::approving(),
        MockSummarizer::fixed("unused"),
        review_config().with_review_cadence(2),
    );

    assert!(workflow
        .actor_think(think("one"))
        .await
        .unwrap()
        .review
        .is_none());
    assert!(workflow
        .actor_think(think("two"))
        .await
        .unwrap()
        .review
        .is_some());
    assert!(workflow
        .actor_think(think("three"))
        .await
        .unwrap()
        .review
        .is_none());
}

#[tokio::test]
async fn actor_nodes_require_tags() {
    let (_dir, store) = scratch_store();
    let workflow = quiet_engine(store.clone());

    let err = workflow
        .actor_think(thoughtloop::ThinkInput::new(CTX, "untagged"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
    assert!(store.nodes_chronological(&project()).unwrap().is_empty());
}

#[tokio::test]
async fn empty_content_is_caught_before_the_gateway() {
    let (_dir, store) = scratch_store();
    // A failing reviewer proves the guard short-circuits the gateway call.
    let workflow = engine(
        store,
        MockReviewer::failing(GatewayError::Unavailable("must not be called".into())),
        MockSummarizer::fixed("unused"),
        review_config(),
    );

    let actor = workflow.actor_think(think("   ")).await.unwrap().actor;
    let critic = workflow
        .critic_review(CTX, &actor.id.to_string())
        .await
        .unwrap();
    assert_eq!(critic.verdict, Some(Verdict::NeedsRevision));
    assert!(critic.verdict_reason.unwrap().contains("empty"));
}

#[tokio::test]
async fn filename_mention_without_artifacts_needs_revision_then_passes() {
    let (_dir, store) = scratch_store();
    let workflow = engine(
        store,
        MockReviewer::approving(),
        MockSummarizer::fixed("unused"),
        review_config(),
    );

    let a = workflow
        .actor_think(think("updated auth.ts"))
        .await
        .unwrap()
        .actor;
    let verdict = workflow.critic_review(CTX, &a.id.to_string()).await.unwrap();
    assert_eq!(verdict.verdict, Some(Verdict::NeedsRevision));
    assert!(verdict.verdict_reason.unwrap().contains("artifact"));

    let a2 = workflow
        .actor_think(
            think("updated auth.ts")
                .with_artifacts(vec![ArtifactRef::new("auth module", "auth.ts")]),
        )
        .await
        .unwrap()
        .actor;
    let verdict = workflow
        .critic_review(CTX, &a2.id.to_string())
        .await
        .unwrap();
    assert_eq!(verdict.verdict, Some(Verdict::Approved));
}

#[tokio::test]
async fn revision_ceiling_forces_reject() {
    let (_dir, store) = scratch_store();
    let workflow = engine(
        store,
        MockReviewer::approving()
            .with_outcome(ReviewOutcome::needs_revision("vague"))
            .with_outcome(ReviewOutcome::needs_revision("still vague")),
        MockSummarizer::fixed("unused"),
        review_config().with_max_revisions(2),
    );

    let actor = workflow
        .actor_think(think("a perfectly reviewable step"))
        .await
        .unwrap()
        .actor;
    let id = actor.id.to_string();

    let first = workflow.critic_review(CTX, &id).await.unwrap();
    assert_eq!(first.verdict, Some(Verdict::NeedsRevision));
    assert_eq!(workflow.tracker().get(&actor.id), 1);

    let second = workflow.critic_review(CTX, &id).await.unwrap();
    assert_eq!(second.verdict, Some(Verdict::NeedsRevision));
    assert_eq!(workflow.tracker().get(&actor.id), 2);

    // Ceiling reached: the local guard rejects without consulting the
    // gateway (which would have approved), then clears the counter.
    let third = workflow.critic_review(CTX, &id).await.unwrap();
    assert_eq!(third.verdict, Some(Verdict::Reject));
    assert_eq!(workflow.tracker().get(&actor.id), 0);
}

#[tokio::test]
async fn gateway_failure_falls_back_to_needs_revision() {
    let (_dir, store) = scratch_store();
    let workflow = engine(
        store,
        MockReviewer::failing(GatewayError::Invocation("model crashed".into())),
        MockSummarizer::fixed("unused"),
        review_config(),
    );

    let actor = workflow
        .actor_think(think("solid, reviewable content"))
        .await
        .unwrap()
        .actor;
    let critic = workflow
        .critic_review(CTX, &actor.id.to_string())
        .await
        .unwrap();
    assert_eq!(critic.verdict, Some(Verdict::NeedsRevision));
    assert!(critic.verdict_reason.unwrap().contains("reviewer unavailable"));
}

struct SlowReviewer;

#[async_trait]
impl ReviewerGateway for SlowReviewer {
    async fn review(&self, _request: &ReviewRequest) -> Result<ReviewOutcome, GatewayError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(ReviewOutcome::approved())
    }
}

#[tokio::test]
async fn gateway_deadline_maps_to_needs_revision() {
    let (_dir, store) = scratch_store();
    let workflow = engine(
        store,
        SlowReviewer,
        MockSummarizer::fixed("unused"),
        review_config().with_gateway_timeout(Duration::from_millis(20)),
    );

    let actor = workflow
        .actor_think(think("will time out in review"))
        .await
        .unwrap()
        .actor;
    let critic = workflow
        .critic_review(CTX, &actor.id.to_string())
        .await
        .unwrap();
    assert_eq!(critic.verdict, Some(Verdict::NeedsRevision));
    assert!(critic.verdict_reason.unwrap().contains("timed out"));
}

#[tokio::test]
async fn reviewing_a_non_actor_node_fails_and_appends_nothing() {
    let (_dir, store) = scratch_store();
    let workflow = engine(
        store.clone(),
        MockReviewer::approving(),
        MockSummarizer::fixed("unused"),
        review_config(),
    );

    let outcome = workflow.actor_think(think("step").done()).await.unwrap();
    let critic_id = outcome.review.unwrap().id;
    let before = store.nodes_chronological(&project()).unwrap().len();

    let err = workflow
        .critic_review(CTX, &critic_id.to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidTarget(_)));
    assert_eq!(store.nodes_chronological(&project()).unwrap().len(), before);
}

#[tokio::test]
async fn explicit_parents_merge_two_branches() {
    let (_dir, store) = scratch_store();
    let workflow = quiet_engine(store.clone());

    let root = workflow.actor_think(think("root")).await.unwrap().actor;
    let left = workflow.actor_think(think("left")).await.unwrap().actor;
    let right = workflow
        .actor_think(think("right").with_parents(vec![root.id]))
        .await
        .unwrap()
        .actor;

    let merge = workflow
        .actor_think(think("merge").with_parents(vec![left.id, right.id]))
        .await
        .unwrap()
        .actor;
    assert_eq!(merge.parents, vec![left.id, right.id]);

    let heads = store.heads(&project()).unwrap();
    assert_eq!(heads.len(), 1);
    assert_eq!(heads[0].id, merge.id);
    // Parent->child links are visible after the paired appends.
    let left_reloaded = store.get(&left.id, &project()).unwrap().unwrap();
    assert!(left_reloaded.children.contains(&merge.id));
}

#[tokio::test]
async fn multi_head_continuation_takes_all_heads_as_parents() {
    let (_dir, store) = scratch_store();
    let workflow = quiet_engine(store.clone());

    let root = workflow.actor_think(think("root")).await.unwrap().actor;
    let a = workflow.actor_think(think("a")).await.unwrap().actor;
    let b = workflow
        .actor_think(think("b").with_parents(vec![root.id]))
        .await
        .unwrap()
        .actor;

    // No explicit parents: both current heads become parents.
    let join = workflow.actor_think(think("join")).await.unwrap().actor;
    assert_eq!(join.parents.len(), 2);
    assert!(join.parents.contains(&a.id));
    assert!(join.parents.contains(&b.id));
}
