//! TreeSession driven through its channels.

use std::sync::Arc;

use dataset_client::{DatasetRecord, InProcessGateway};
use facet_tree::{
    FacetCatalog, NodeId, NodeStateKind, SessionOutput, TreeController, TreeSession, UiEvent,
};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

fn controller() -> TreeController {
    let records = vec![
        DatasetRecord::new(1u64, "/a").with_attribute("lab", "smith"),
        DatasetRecord::new(2u64, "/b").with_attribute("lab", "smith"),
        DatasetRecord::new(3u64, "/c").with_attribute("lab", "jones"),
        DatasetRecord::new(4u64, "/d"),
    ];
    TreeController::new(
        Arc::new(InProcessGateway::new(records)),
        FacetCatalog::new(["lab", "type"]),
    )
}

async fn run_session(events: Vec<UiEvent>) -> (TreeController, Vec<SessionOutput>) {
    let (ui_tx, ui_rx) = mpsc::channel(16);
    let (out_tx, mut out_rx) = mpsc::channel(64);
    let session = tokio::spawn(TreeSession::new(controller()).run(ui_rx, out_tx));

    for event in events {
        ui_tx.send(event).await.unwrap();
    }
    drop(ui_tx);

    let controller = session.await.unwrap();
    let mut outputs = Vec::new();
    while let Some(output) = out_rx.recv().await {
        outputs.push(output);
    }
    (controller, outputs)
}

fn state_changes(outputs: &[SessionOutput]) -> Vec<(NodeId, NodeStateKind)> {
    outputs
        .iter()
        .filter_map(|o| match o {
            SessionOutput::NodeStateChanged(change) => Some((change.node, change.kind())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_session_seeds_root_and_finishes() {
    let (controller, outputs) = run_session(Vec::new()).await;

    assert_eq!(
        state_changes(&outputs),
        vec![
            (NodeId::ROOT, NodeStateKind::Loading),
            (NodeId::ROOT, NodeStateKind::ExpandedLeaf),
        ]
    );
    assert_eq!(controller.tree().root().count(), Some(4));
}

#[tokio::test]
async fn test_facet_selection_reports_catalog_and_reexpansion() {
    let (controller, outputs) =
        run_session(vec![UiEvent::FacetSelected("lab".to_string())]).await;

    assert!(outputs.contains(&SessionOutput::CatalogChanged {
        selected: vec!["lab".to_string()],
        remaining: vec!["type".to_string()],
        exhausted: false,
    }));
    assert_eq!(
        controller.tree().root().kind(),
        NodeStateKind::ExpandedBranch
    );
    // Every Loading announcement is followed by a settled state for that node
    let root_states: Vec<_> = state_changes(&outputs)
        .into_iter()
        .filter(|(id, _)| *id == NodeId::ROOT)
        .map(|(_, kind)| kind)
        .collect();
    assert_eq!(root_states.last(), Some(&NodeStateKind::ExpandedBranch));
}

#[tokio::test]
async fn test_rejected_facet_and_unknown_node_are_reported() {
    let (_, outputs) = run_session(vec![
        UiEvent::FacetSelected("colour".to_string()),
        UiEvent::NodeActivated(NodeId::ROOT),
    ])
    .await;

    assert!(outputs.iter().any(|o| matches!(
        o,
        SessionOutput::FacetRejected { facet, error } if facet == "colour" && error.is_invalid_facet()
    )));
    // Root is already loading or expanded, so activation issues nothing
    assert_eq!(
        state_changes(&outputs)
            .iter()
            .filter(|(_, kind)| *kind == NodeStateKind::Loading)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_activating_child_through_session() {
    // First session builds the branch; children ids are stable
    let (controller, _) = run_session(vec![UiEvent::FacetSelected("lab".into())]).await;
    let smith = controller
        .tree()
        .children(NodeId::ROOT)
        .first()
        .map(|n| n.id())
        .unwrap();

    let (ui_tx, ui_rx) = mpsc::channel(4);
    let (out_tx, mut out_rx) = mpsc::channel(16);
    let session = tokio::spawn(TreeSession::new(controller).run(ui_rx, out_tx));
    ui_tx.send(UiEvent::NodeActivated(smith)).await.unwrap();
    ui_tx
        .send(UiEvent::NodeActivated(NodeId::from(999)))
        .await
        .unwrap();
    drop(ui_tx);
    let controller = session.await.unwrap();

    let mut outputs = Vec::new();
    while let Some(output) = out_rx.recv().await {
        outputs.push(output);
    }
    assert!(outputs.contains(&SessionOutput::UnknownNode(NodeId::from(999))));
    assert_eq!(
        controller.node(smith).unwrap().kind(),
        NodeStateKind::ExpandedLeaf
    );
}
