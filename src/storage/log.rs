//! Append-only log storage backend
//!
//! One self-describing JSON record per line in a single UTF-8 log file shared
//! by every project. Physical writes are serialized across processes by an
//! exclusive advisory file lock; each process's per-project view is a private
//! cache rebuilt by replaying the log (last record for an id wins).

use super::branch::BranchIndex;
use super::traits::{GraphStore, StoreError, StoreResult};
use crate::graph::{ArtifactRef, Node, NodeId, ProjectId, Record};
use chrono::Utc;
use dashmap::DashMap;
use fs2::FileExt;
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Materialized state of one project
#[derive(Debug, Default)]
struct ProjectView {
    nodes: HashMap<NodeId, Node>,
    /// Node ids in order of first appearance on the log
    order: Vec<NodeId>,
    artifacts: HashMap<String, ArtifactRef>,
    artifact_order: Vec<String>,
    branches: BranchIndex,
}

impl ProjectView {
    /// Overwrite-by-id application of a single record
    fn apply(&mut self, record: &Record) {
        match record {
            Record::Node(node) => {
                if !self.nodes.contains_key(&node.id) {
                    self.order.push(node.id);
                }
                if let Some(label) = &node.branch_label {
                    self.branches.insert(label.clone(), node.id);
                }
                self.nodes.insert(node.id, node.clone());
            }
            Record::Artifact(artifact) => {
                if !self.artifacts.contains_key(&artifact.id) {
                    self.artifact_order.push(artifact.id.clone());
                }
                self.artifacts.insert(artifact.id.clone(), artifact.clone());
            }
        }
    }

    /// Rebuild every node's children purely from `parents` pointers
    ///
    /// Stored children arrays are never trusted: the two related appends
    /// (child node, then parent update) are separate lock cycles, so a crash
    /// between them can leave a parent whose stored children omit the child.
    fn derive_children(&mut self) {
        let mut derived: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for id in &self.order {
            let parents = match self.nodes.get(id) {
                Some(node) => node.parents.clone(),
                None => continue,
            };
            for parent in parents {
                let entry = derived.entry(parent).or_default();
                if !entry.contains(id) {
                    entry.push(*id);
                }
            }
        }
        for node in self.nodes.values_mut() {
            node.children = derived.remove(&node.id).unwrap_or_default();
        }
    }
}

/// Append-only log store with lazy per-project materialization
pub struct LogStore {
    path: PathBuf,
    lock_timeout: Duration,
    projects: DashMap<ProjectId, ProjectView>,
}

impl LogStore {
    /// Open a store on the given log file, creating parent directories
    ///
    /// The file itself is created on first append.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            lock_timeout: Duration::from_secs(1),
            projects: DashMap::new(),
        })
    }

    /// Override the advisory-lock acquisition timeout
    ///
    /// Lock acquisition under contention blocks the calling thread for up to
    /// this long before `append` fails with `LockTimeout`; keep it short when
    /// appending from async contexts.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Path of the backing log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Materialize a project if it has not been touched yet
    fn ensure_view(&self, project: &ProjectId) -> StoreResult<()> {
        if self.projects.contains_key(project) {
            return Ok(());
        }
        let view = self.load_project(project)?;
        self.projects.entry(project.clone()).or_insert(view);
        Ok(())
    }

    /// Full replay of the log filtered by project tag
    fn load_project(&self, project: &ProjectId) -> StoreResult<ProjectView> {
        let mut view = ProjectView::default();
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(view),
            Err(e) => return Err(e.into()),
        };

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(error) => {
                    warn!(line = line_no + 1, %error, "skipping corrupt log record");
                    continue;
                }
            };
            if record.project() == project {
                view.apply(&record);
            }
        }
        view.derive_children();
        debug!(
            project = %project,
            nodes = view.nodes.len(),
            artifacts = view.artifacts.len(),
            "materialized project from log"
        );
        Ok(view)
    }

    /// Acquire the exclusive advisory lock, retrying until the timeout
    fn lock_exclusive(&self, file: &File) -> StoreResult<()> {
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::LockTimeout(self.lock_timeout));
                    }
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn with_view<T>(
        &self,
        project: &ProjectId,
        f: impl FnOnce(&ProjectView) -> T,
    ) -> StoreResult<T> {
        self.ensure_view(project)?;
        let view = self
            .projects
            .get(project)
            .expect("view materialized above");
        Ok(f(&view))
    }
}

impl GraphStore for LogStore {
    fn append(&self, mut record: Record, project_context: &str) -> StoreResult<Record> {
        let project = ProjectId::derive(project_context)?;
        record.set_project(project.clone());
        // First append stamps the node; the children-update re-append of the
        // same id must keep the original stamp or last-record-wins replay
        // would shift creation times.
        if let Record::Node(node) = &mut record {
            if node.created_at.is_none() {
                node.created_at = Some(Utc::now());
            }
        }
        let line = serde_json::to_string(&record)?;

        // A single line is the atomicity unit: either the whole record lands
        // on the log or nothing does.
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.lock_exclusive(&file)?;
        let written = file
            .write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.flush());
        let unlocked = FileExt::unlock(&file);
        written?;
        unlocked?;

        // Only update the view if the project is already materialized; a
        // later lazy scan picks the record up from the log otherwise.
        if let Some(mut view) = self.projects.get_mut(&project) {
            view.apply(&record);
        }
        Ok(record)
    }

    fn get(&self, id: &NodeId, project: &ProjectId) -> StoreResult<Option<Node>> {
        self.with_view(project, |view| view.nodes.get(id).cloned())
    }

    fn heads(&self, project: &ProjectId) -> StoreResult<Vec<Node>> {
        self.with_view(project, |view| {
            let referenced: HashSet<NodeId> = view
                .nodes
                .values()
                .flat_map(|n| n.parents.iter().copied())
                .collect();
            view.order
                .iter()
                .filter(|id| !referenced.contains(id))
                .filter_map(|id| view.nodes.get(id).cloned())
                .collect()
        })
    }

    fn depth(&self, id: &NodeId, project: &ProjectId) -> StoreResult<usize> {
        self.with_view(project, |view| {
            if !view.nodes.contains_key(id) {
                return Err(StoreError::NodeNotFound(*id));
            }
            let mut memo = HashMap::new();
            Ok(longest_path_depth(&view.nodes, id, &mut memo))
        })?
    }

    fn list_projects(&self) -> StoreResult<Vec<ProjectId>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut seen = HashSet::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(&line) {
                Ok(record) => {
                    seen.insert(record.project().clone());
                }
                Err(error) => {
                    warn!(line = line_no + 1, %error, "skipping corrupt log record");
                }
            }
        }
        let mut projects: Vec<ProjectId> = seen.into_iter().collect();
        projects.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(projects)
    }

    fn nodes_chronological(&self, project: &ProjectId) -> StoreResult<Vec<Node>> {
        self.with_view(project, |view| {
            view.order
                .iter()
                .filter_map(|id| view.nodes.get(id).cloned())
                .collect()
        })
    }

    fn resolve_branch(&self, id_or_label: &str, project: &ProjectId) -> StoreResult<NodeId> {
        self.with_view(project, |view| {
            view.branches
                .resolve(id_or_label)
                .filter(|id| view.nodes.contains_key(id))
                .ok_or_else(|| StoreError::BranchNotFound(id_or_label.to_string()))
        })?
    }

    fn list_artifacts(&self, project: &ProjectId) -> StoreResult<Vec<ArtifactRef>> {
        self.with_view(project, |view| {
            view.artifact_order
                .iter()
                .filter_map(|id| view.artifacts.get(id).cloned())
                .collect()
        })
    }

    fn reload_project(&self, project: &ProjectId) -> StoreResult<()> {
        let view = self.load_project(project)?;
        self.projects.insert(project.clone(), view);
        Ok(())
    }
}

enum DepthState {
    /// On the current DFS stack; contributes no further depth (cycle guard)
    InProgress,
    Done(usize),
}

/// Longest path to a root along `parents`, memoized
///
/// Diamond-shaped merges are counted correctly (each node is fully resolved
/// once); a node re-entered while still on the stack contributes zero, which
/// bounds the result on cyclic input instead of recursing forever.
fn longest_path_depth(
    nodes: &HashMap<NodeId, Node>,
    id: &NodeId,
    memo: &mut HashMap<NodeId, DepthState>,
) -> usize {
    match memo.get(id) {
        Some(DepthState::Done(d)) => return *d,
        Some(DepthState::InProgress) => return 0,
        None => {}
    }
    memo.insert(*id, DepthState::InProgress);

    let parent_depth = nodes
        .get(id)
        .map(|node| {
            node.parents
                .iter()
                .filter(|p| nodes.contains_key(p))
                .map(|p| longest_path_depth(nodes, p, memo))
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);

    let depth = parent_depth + 1;
    memo.insert(*id, DepthState::Done(depth));
    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CTX: &str = "/home/dev/demo";

    fn scratch() -> (TempDir, LogStore) {
        let dir = TempDir::new().unwrap();
        let store = LogStore::open(dir.path().join("graph.jsonl")).unwrap();
        (dir, store)
    }

    fn project() -> ProjectId {
        ProjectId::derive(CTX).unwrap()
    }

    fn append_node(store: &LogStore, node: Node) -> Node {
        match store.append(Record::Node(node), CTX).unwrap() {
            Record::Node(n) => n,
            _ => unreachable!(),
        }
    }

    #[test]
    fn append_stamps_timestamp_and_project() {
        let (_dir, store) = scratch();
        let node = append_node(&store, Node::actor(ProjectId::unscoped(), "first"));
        assert!(node.created_at.is_some());
        assert_eq!(node.project, project());
        assert_eq!(
            store.get(&node.id, &project()).unwrap().unwrap().content,
            "first"
        );
    }

    #[test]
    fn append_rejects_underivable_project_context() {
        let (_dir, store) = scratch();
        let err = store
            .append(Record::Node(Node::actor(ProjectId::unscoped(), "x")), "///")
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidProject(_)));
    }

    #[test]
    fn reload_reproduces_identical_view() {
        let (_dir, store) = scratch();
        let a = append_node(&store, Node::actor(ProjectId::unscoped(), "a"));
        let b = append_node(
            &store,
            Node::actor(ProjectId::unscoped(), "b").with_parents(vec![a.id]),
        );

        let reopened = LogStore::open(store.path()).unwrap();
        let nodes = reopened.nodes_chronological(&project()).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, a.id);
        assert_eq!(nodes[1].id, b.id);
        // Children derived from parents pointers even though a's stored
        // record never listed b.
        assert_eq!(nodes[0].children, vec![b.id]);
    }

    #[test]
    fn last_record_for_an_id_wins() {
        let (_dir, store) = scratch();
        let node = append_node(&store, Node::actor(ProjectId::unscoped(), "v1"));
        let mut updated = node.clone();
        updated.content = "v2".into();
        store.append(Record::Node(updated), CTX).unwrap();

        let reopened = LogStore::open(store.path()).unwrap();
        let latest = reopened.get(&node.id, &project()).unwrap().unwrap();
        assert_eq!(latest.content, "v2");
        assert_eq!(reopened.nodes_chronological(&project()).unwrap().len(), 1);
    }

    #[test]
    fn reappending_a_node_preserves_its_creation_stamp() {
        let (_dir, store) = scratch();
        let node = append_node(&store, Node::actor(ProjectId::unscoped(), "original"));
        let stamp = node.created_at.unwrap();
        std::thread::sleep(Duration::from_millis(20));

        // The children-update half of a paired append.
        let mut updated = node.clone();
        updated.children.push(NodeId::new());
        store.append(Record::Node(updated), CTX).unwrap();

        let reopened = LogStore::open(store.path()).unwrap();
        let latest = reopened.get(&node.id, &project()).unwrap().unwrap();
        assert_eq!(latest.created_at, Some(stamp));
    }

    #[test]
    fn contended_lock_times_out_instead_of_hanging() {
        let (_dir, store) = scratch();
        append_node(&store, Node::actor(ProjectId::unscoped(), "seed"));
        let store = store.with_lock_timeout(Duration::from_millis(50));

        let holder = OpenOptions::new().append(true).open(store.path()).unwrap();
        holder.lock_exclusive().unwrap();

        let err = store
            .append(Record::Node(Node::actor(ProjectId::unscoped(), "blocked")), CTX)
            .unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout(_)));
        FileExt::unlock(&holder).unwrap();
    }

    #[test]
    fn corrupt_lines_are_skipped_not_fatal() {
        let (_dir, store) = scratch();
        let a = append_node(&store, Node::actor(ProjectId::unscoped(), "kept"));
        {
            let mut f = OpenOptions::new().append(true).open(store.path()).unwrap();
            writeln!(f, "{{not json at all").unwrap();
        }
        let b = append_node(&store, Node::actor(ProjectId::unscoped(), "also kept"));

        let reopened = LogStore::open(store.path()).unwrap();
        let nodes = reopened.nodes_chronological(&project()).unwrap();
        assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    }

    #[test]
    fn heads_excludes_referenced_parents() {
        let (_dir, store) = scratch();
        let a = append_node(&store, Node::actor(ProjectId::unscoped(), "a"));
        let b = append_node(
            &store,
            Node::actor(ProjectId::unscoped(), "b").with_parents(vec![a.id]),
        );

        let heads = store.heads(&project()).unwrap();
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].id, b.id);
    }

    #[test]
    fn depth_counts_longest_path() {
        let (_dir, store) = scratch();
        let root = append_node(&store, Node::actor(ProjectId::unscoped(), "root"));
        let a = append_node(
            &store,
            Node::actor(ProjectId::unscoped(), "a").with_parents(vec![root.id]),
        );
        let b = append_node(
            &store,
            Node::actor(ProjectId::unscoped(), "b").with_parents(vec![a.id]),
        );
        let c = append_node(
            &store,
            Node::actor(ProjectId::unscoped(), "c").with_parents(vec![b.id]),
        );

        assert_eq!(store.depth(&root.id, &project()).unwrap(), 1);
        assert_eq!(store.depth(&c.id, &project()).unwrap(), 4);
    }

    #[test]
    fn depth_counts_the_long_side_of_a_diamond() {
        let (_dir, store) = scratch();
        let root = append_node(&store, Node::actor(ProjectId::unscoped(), "root"));
        let short = append_node(
            &store,
            Node::actor(ProjectId::unscoped(), "short").with_parents(vec![root.id]),
        );
        let long1 = append_node(
            &store,
            Node::actor(ProjectId::unscoped(), "long1").with_parents(vec![root.id]),
        );
        let long2 = append_node(
            &store,
            Node::actor(ProjectId::unscoped(), "long2").with_parents(vec![long1.id]),
        );
        let merge = append_node(
            &store,
            Node::actor(ProjectId::unscoped(), "merge").with_parents(vec![short.id, long2.id]),
        );

        assert_eq!(store.depth(&merge.id, &project()).unwrap(), 4);
    }

    #[test]
    fn depth_terminates_on_a_two_node_cycle() {
        // Hand-write a cycle directly; the workflow layer never produces one
        // but replay must still terminate on hostile input.
        let (_dir, store) = scratch();
        let a_id = NodeId::new();
        let b_id = NodeId::new();
        let mut a = Node::actor(ProjectId::unscoped(), "a");
        a.id = a_id;
        a.parents = vec![b_id];
        let mut b = Node::actor(ProjectId::unscoped(), "b");
        b.id = b_id;
        b.parents = vec![a_id];
        store.append(Record::Node(a), CTX).unwrap();
        store.append(Record::Node(b), CTX).unwrap();

        let depth = store.depth(&a_id, &project()).unwrap();
        assert!(depth >= 1 && depth <= 2, "bounded, got {depth}");
    }

    #[test]
    fn projects_never_cross() {
        let (_dir, store) = scratch();
        append_node(&store, Node::actor(ProjectId::unscoped(), "ours"));
        store
            .append(
                Record::Node(Node::actor(ProjectId::unscoped(), "theirs")),
                "/srv/other",
            )
            .unwrap();

        assert_eq!(store.nodes_chronological(&project()).unwrap().len(), 1);
        let projects = store.list_projects().unwrap();
        assert_eq!(projects.len(), 2);
    }

    #[test]
    fn reload_picks_up_external_appends() {
        let (_dir, store) = scratch();
        append_node(&store, Node::actor(ProjectId::unscoped(), "mine"));

        // A peer process writing to the same log.
        let peer = LogStore::open(store.path()).unwrap();
        peer.append(
            Record::Node(Node::actor(ProjectId::unscoped(), "peer write")),
            CTX,
        )
        .unwrap();

        // Private cache does not see it until an explicit reload.
        assert_eq!(store.nodes_chronological(&project()).unwrap().len(), 1);
        store.reload_project(&project()).unwrap();
        assert_eq!(store.nodes_chronological(&project()).unwrap().len(), 2);
    }

    #[test]
    fn resolve_branch_by_label_and_id() {
        let (_dir, store) = scratch();
        let labeled = append_node(
            &store,
            Node::actor(ProjectId::unscoped(), "start").with_branch_label("experiment"),
        );

        assert_eq!(
            store.resolve_branch("experiment", &project()).unwrap(),
            labeled.id
        );
        assert_eq!(
            store
                .resolve_branch(&labeled.id.to_string(), &project())
                .unwrap(),
            labeled.id
        );
        assert!(matches!(
            store.resolve_branch("nope", &project()),
            Err(StoreError::BranchNotFound(_))
        ));
    }

    #[test]
    fn artifact_records_round_trip() {
        let (_dir, store) = scratch();
        let artifact = ArtifactRef::new("auth module", "src/auth.ts").with_hash("abc123");
        store.append(Record::Artifact(artifact.clone()), CTX).unwrap();

        let reopened = LogStore::open(store.path()).unwrap();
        let listed = reopened.list_artifacts(&project()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, artifact.id);
        assert_eq!(listed[0].uri, "src/auth.ts");
        assert_eq!(listed[0].project, project());
    }
}
