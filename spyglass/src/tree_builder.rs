//! Subtree snapshots, bulk where possible and incremental otherwise

use crate::element::{convert, ControlType, ElementProperties, ElementRecord};
use crate::element_id::{ElementId, IdScope};
use crate::failure::{ProviderError, ProviderResult};
use crate::platforms::{CachedElement, RawElement};
use crate::services::CoordinateService;
use crate::strategy::FilterMode;
use tracing::{debug, warn};

/// Parameters of one tree build.
#[derive(Debug, Clone)]
pub struct TreeRequest {
    /// Deepest level included; the root is level 0.
    pub max_depth: usize,
    /// Control types to keep. Empty keeps everything.
    pub control_types: Vec<ControlType>,
    pub filter_mode: FilterMode,
    pub scan_budget: usize,
    /// Try one bulk fetch before walking live elements.
    pub use_bulk_cache: bool,
}

impl TreeRequest {
    fn is_filtered(&self) -> bool {
        !self.control_types.is_empty()
    }

    fn matches(&self, properties: &ElementProperties) -> bool {
        !self.is_filtered() || self.control_types.contains(&properties.control_type)
    }
}

/// One node of a built tree with its freshly minted id.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub element: RawElement,
    pub properties: ElementProperties,
    pub id: ElementId,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn into_record(self, coordinates: &dyn CoordinateService) -> ElementRecord {
        let mut record = convert(&self.properties, &self.id, coordinates);
        record.children = Some(
            self.children
                .into_iter()
                .map(|child| child.into_record(coordinates))
                .collect(),
        );
        record
    }

    /// Number of nodes in this subtree, including this one.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(|c| c.count()).sum::<usize>()
    }
}

/// Result of a tree build plus its statistics.
#[derive(Debug)]
pub struct TreeOutcome {
    pub root: TreeNode,
    pub scanned: usize,
    pub truncated: bool,
    pub used_bulk_cache: bool,
    pub errors: usize,
    pub max_depth_reached: usize,
}

/// Budget and progress of one walk. Early exit is an explicit flag checked
/// between visits.
#[derive(Debug)]
pub(crate) struct WalkContext {
    budget: usize,
    pub(crate) scanned: usize,
    pub(crate) truncated: bool,
    pub(crate) errors: usize,
    pub(crate) max_depth_reached: usize,
}

impl WalkContext {
    pub(crate) fn new(budget: usize) -> Self {
        Self {
            budget,
            scanned: 0,
            truncated: false,
            errors: 0,
            max_depth_reached: 0,
        }
    }

    /// Accounts for one visit; false once the budget is spent.
    pub(crate) fn visit(&mut self) -> bool {
        if self.truncated {
            return false;
        }
        if self.scanned >= self.budget {
            self.truncated = true;
            return false;
        }
        self.scanned += 1;
        true
    }

    pub(crate) fn stopped(&self) -> bool {
        self.truncated
    }

    pub(crate) fn reached(&mut self, depth: usize) {
        self.max_depth_reached = self.max_depth_reached.max(depth);
    }

    pub(crate) fn record_error(&mut self, what: &str, error: &ProviderError) {
        debug!("{}: {}", what, error);
        self.errors += 1;
    }
}

/// Uniform view over bulk-cached and live elements.
pub(crate) trait WalkNode: Sized {
    fn element(&self) -> RawElement;
    fn properties(&self) -> ProviderResult<ElementProperties>;
    fn children(&self) -> ProviderResult<Vec<Self>>;
}

impl<'a> WalkNode for &'a CachedElement {
    fn element(&self) -> RawElement {
        self.element.clone()
    }

    fn properties(&self) -> ProviderResult<ElementProperties> {
        Ok(self.properties.clone())
    }

    fn children(&self) -> ProviderResult<Vec<Self>> {
        let this: &'a CachedElement = self;
        Ok(this.children.iter().collect())
    }
}

/// Live element whose properties are read on first use.
pub(crate) struct LiveNode(pub(crate) RawElement);

impl WalkNode for LiveNode {
    fn element(&self) -> RawElement {
        self.0.clone()
    }

    fn properties(&self) -> ProviderResult<ElementProperties> {
        self.0.properties()
    }

    fn children(&self) -> ProviderResult<Vec<Self>> {
        Ok(self.0.children()?.into_iter().map(LiveNode).collect())
    }
}

/// Nodes a subtree contributes to its parent and how many matches they hold.
struct Contribution {
    nodes: Vec<TreeNode>,
    matches: usize,
}

impl Contribution {
    fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            matches: 0,
        }
    }
}

/// Builds the snapshot rooted at `root`, whose id is `root_id`.
///
/// Only a failure to read the root itself is an error. Everything below is
/// best effort: unreadable nodes are skipped and counted.
pub fn build_tree(
    root: &RawElement,
    root_id: &ElementId,
    request: &TreeRequest,
) -> ProviderResult<TreeOutcome> {
    let scope = IdScope::from_id(root_id);

    if request.use_bulk_cache {
        match root.cache_subtree(request.max_depth) {
            Ok(cached) => {
                let mut ctx = WalkContext::new(request.scan_budget);
                let node = walk_root(&cached, &scope, request, &mut ctx)?;
                return Ok(finish(node, ctx, true));
            }
            Err(e) if e.is_stale() => return Err(e),
            Err(e) => debug!("bulk cache unavailable, walking incrementally: {}", e),
        }
    }

    let mut ctx = WalkContext::new(request.scan_budget);
    let node = walk_root(LiveNode(root.clone()), &scope, request, &mut ctx)?;
    Ok(finish(node, ctx, false))
}

fn finish(root: TreeNode, ctx: WalkContext, used_bulk_cache: bool) -> TreeOutcome {
    if ctx.truncated {
        warn!(
            "tree build stopped after scanning {} elements; result is partial",
            ctx.scanned
        );
    }
    TreeOutcome {
        root,
        scanned: ctx.scanned,
        truncated: ctx.truncated,
        used_bulk_cache,
        errors: ctx.errors,
        max_depth_reached: ctx.max_depth_reached,
    }
}

/// The root is always kept, matching or not, with every child contribution.
fn walk_root<N: WalkNode>(
    node: N,
    scope: &IdScope,
    request: &TreeRequest,
    ctx: &mut WalkContext,
) -> ProviderResult<TreeNode> {
    ctx.visit();
    let properties = node.properties()?;
    let (id, child_scope) = scope.mint(&properties);

    let mut children = Vec::new();
    if request.max_depth > 0 {
        match node.children() {
            Ok(kids) => {
                for (index, child) in kids.into_iter().enumerate() {
                    if ctx.stopped() {
                        break;
                    }
                    let contribution = walk(child, 1, &child_scope.child(index), request, ctx);
                    children.extend(contribution.nodes);
                }
            }
            Err(e) => ctx.record_error("children of root unavailable", &e),
        }
    }

    Ok(TreeNode {
        element: node.element(),
        properties,
        id,
        children,
    })
}

fn walk<N: WalkNode>(
    node: N,
    depth: usize,
    scope: &IdScope,
    request: &TreeRequest,
    ctx: &mut WalkContext,
) -> Contribution {
    if !ctx.visit() {
        return Contribution::empty();
    }
    let properties = match node.properties() {
        Ok(p) => p,
        Err(e) => {
            ctx.record_error("skipping unreadable element", &e);
            return Contribution::empty();
        }
    };
    ctx.reached(depth);

    let (id, child_scope) = scope.mint(&properties);
    let is_match = request.matches(&properties);

    let kids = if depth < request.max_depth {
        match node.children() {
            Ok(kids) => kids,
            Err(e) => {
                ctx.record_error("children unavailable", &e);
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let make = |children: Vec<TreeNode>| TreeNode {
        element: node.element(),
        properties: properties.clone(),
        id: id.clone(),
        children,
    };

    if is_match || request.filter_mode == FilterMode::PostHoc {
        let mut children = Vec::new();
        let mut matches = 0;
        for (index, child) in kids.into_iter().enumerate() {
            if ctx.stopped() {
                break;
            }
            let contribution = walk(child, depth + 1, &child_scope.child(index), request, ctx);
            matches += contribution.matches;
            children.extend(contribution.nodes);
        }

        if is_match {
            return Contribution {
                nodes: vec![make(children)],
                matches: matches + 1,
            };
        }
        // Post-hoc, non-matching: splice, keep as container, or drop.
        return match matches {
            0 => Contribution::empty(),
            1 => Contribution {
                nodes: children,
                matches,
            },
            _ => Contribution {
                nodes: vec![make(children)],
                matches,
            },
        };
    }

    // Inline, non-matching: splice in the first matching descendant only.
    for (index, child) in kids.into_iter().enumerate() {
        if ctx.stopped() {
            break;
        }
        let mut contribution = walk(child, depth + 1, &child_scope.child(index), request, ctx);
        if !contribution.nodes.is_empty() {
            contribution.nodes.truncate(1);
            contribution.matches = 1;
            return contribution;
        }
    }
    Contribution::empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element_id::{IdCodec, IdMode};
    use crate::platforms::memory::{ElementSpec, MemoryDesktop};
    use crate::platforms::AccessibilityProvider;
    use crate::types::WindowHandle;

    fn request(max_depth: usize) -> TreeRequest {
        TreeRequest {
            max_depth,
            control_types: Vec::new(),
            filter_mode: FilterMode::PostHoc,
            scan_budget: 5000,
            use_bulk_cache: true,
        }
    }

    fn nested(depth: usize) -> ElementSpec {
        let mut spec = ElementSpec::new(ControlType::Text, &format!("level-{depth}"));
        if depth < 6 {
            spec = spec.child(nested(depth + 1));
        }
        spec
    }

    fn window_root(desktop: &MemoryDesktop, handle: WindowHandle) -> (RawElement, ElementId) {
        let provider = desktop.provider();
        let window = provider.element_from_handle(handle).unwrap();
        let root = provider.root().unwrap();
        let id = IdCodec::new(&provider).generate(&window, &root, IdMode::Full);
        (window, id)
    }

    fn names(node: &TreeNode) -> Vec<String> {
        let mut out = vec![node.properties.name.clone()];
        for child in &node.children {
            out.extend(names(child));
        }
        out
    }

    fn max_depth(node: &TreeNode) -> usize {
        node.children.iter().map(|c| max_depth(c) + 1).max().unwrap_or(0)
    }

    #[test]
    fn test_depth_bound_holds_on_both_paths() {
        let desktop = MemoryDesktop::new();
        let handle = desktop.add_window(ElementSpec::window("Deep").child(nested(1)));
        let (root, root_id) = window_root(&desktop, handle);

        for bulk in [true, false] {
            let mut req = request(3);
            req.use_bulk_cache = bulk;
            let outcome = build_tree(&root, &root_id, &req).unwrap();
            assert_eq!(max_depth(&outcome.root), 3);
            assert_eq!(outcome.used_bulk_cache, bulk);
            assert!(!outcome.truncated);
        }
    }

    #[test]
    fn test_bulk_falls_back_when_unsupported() {
        let desktop = MemoryDesktop::new();
        let handle = desktop.add_window(ElementSpec::window("W").child(nested(1)));
        desktop.set_bulk_cache(false);
        let (root, root_id) = window_root(&desktop, handle);
        let outcome = build_tree(&root, &root_id, &request(10)).unwrap();
        assert!(!outcome.used_bulk_cache);
        assert_eq!(outcome.root.count(), 7);
    }

    #[test]
    fn test_ids_follow_sibling_indices() {
        let desktop = MemoryDesktop::new();
        let handle = desktop.add_window(ElementSpec::window("W").children([
            ElementSpec::new(ControlType::Pane, "a")
                .child(ElementSpec::new(ControlType::Button, "a0"))
                .child(ElementSpec::new(ControlType::Button, "a1")),
            ElementSpec::new(ControlType::Pane, "b"),
        ]));
        let (root, root_id) = window_root(&desktop, handle);
        let outcome = build_tree(&root, &root_id, &request(5)).unwrap();

        assert_eq!(outcome.root.id, root_id);
        let a1 = &outcome.root.children[0].children[1];
        assert_eq!(a1.properties.name, "a1");
        assert!(a1.id.to_string().ends_with(":0.1"));
        assert!(a1.id.to_string().starts_with(&format!("{}:", handle)));
    }

    #[test]
    fn test_post_hoc_keeps_containers_and_inline_takes_first() {
        let desktop = MemoryDesktop::new();
        let handle = desktop.add_window(ElementSpec::window("W").children([
            ElementSpec::new(ControlType::Pane, "group").children([
                ElementSpec::new(ControlType::Button, "one"),
                ElementSpec::new(ControlType::Button, "two"),
            ]),
            ElementSpec::new(ControlType::Pane, "single")
                .child(ElementSpec::new(ControlType::Pane, "wrapper").child(
                    ElementSpec::new(ControlType::Button, "three"),
                )),
            ElementSpec::new(ControlType::Pane, "empty"),
        ]));
        let (root, root_id) = window_root(&desktop, handle);

        let mut req = request(5);
        req.control_types = vec![ControlType::Button];
        let post_hoc = build_tree(&root, &root_id, &req).unwrap();
        assert_eq!(names(&post_hoc.root), vec!["W", "group", "one", "two", "three"]);

        req.filter_mode = FilterMode::Inline;
        let inline = build_tree(&root, &root_id, &req).unwrap();
        assert_eq!(names(&inline.root), vec!["W", "one", "three"]);
    }

    #[test]
    fn test_budget_truncates_but_returns_valid_tree() {
        let desktop = MemoryDesktop::new();
        let handle = desktop.add_window(
            ElementSpec::window("Big").children(
                (0..50).map(|i| ElementSpec::new(ControlType::ListItem, &format!("item {i}"))),
            ),
        );
        let (root, root_id) = window_root(&desktop, handle);
        let mut req = request(5);
        req.scan_budget = 10;
        let outcome = build_tree(&root, &root_id, &req).unwrap();

        assert!(outcome.truncated);
        assert_eq!(outcome.scanned, 10);
        assert_eq!(outcome.root.children.len(), 9);
    }

    #[test]
    fn test_stale_root_is_an_error() {
        let desktop = MemoryDesktop::new();
        let handle = desktop.add_window(ElementSpec::window("Gone"));
        let (root, root_id) = window_root(&desktop, handle);
        desktop.close_window(handle);
        for bulk in [true, false] {
            let mut req = request(5);
            req.use_bulk_cache = bulk;
            assert!(build_tree(&root, &root_id, &req).unwrap_err().is_stale());
        }
    }
}
