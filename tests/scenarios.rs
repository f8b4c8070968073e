//! Fixed scenarios for the tree algebra across grid levels.

mod fixtures;

use fixtures::abcd::{self, A, A0, A1, B, C, ROOT};
use fixtures::{quad_context, set, sorted, tree};
use hcqr::error::HcqrError;
use hcqr::hcqr::{Hcqr, LeafValue, MemoryHcqr, TreeNode};

#[test]
fn test_full_region_against_fetched_region() {
    let ctx = abcd::context();
    let tree1 = abcd::leaf(&ctx, A, LeafValue::FullMatch);
    let tree2 = abcd::leaf(&ctx, B, LeafValue::Fetched(set([3, 4])));

    assert_eq!(sorted(&tree1.items().unwrap()), vec![1, 2, 3, 4, 5]);
    assert_eq!(sorted(&tree1.intersect(&tree2).unwrap().items().unwrap()), vec![3, 4]);
    assert_eq!(sorted(&tree1.union(&tree2).unwrap().items().unwrap()), vec![1, 2, 3, 4, 5]);
    assert_eq!(sorted(&tree1.difference(&tree2).unwrap().items().unwrap()), vec![1, 2, 5]);
}

#[test]
fn test_scenario_in_static_form() {
    let ctx = abcd::context();
    let tree1 = Hcqr::Static(abcd::leaf(&ctx, A, LeafValue::FullMatch).to_static().unwrap());
    let tree2 = Hcqr::Static(abcd::leaf(&ctx, B, LeafValue::Fetched(set([3, 4]))).to_static().unwrap());

    assert_eq!(sorted(&tree1.intersect(&tree2).unwrap().items().unwrap()), vec![3, 4]);
    assert_eq!(sorted(&tree1.union(&tree2).unwrap().items().unwrap()), vec![1, 2, 3, 4, 5]);
    assert_eq!(sorted(&tree1.difference(&tree2).unwrap().items().unwrap()), vec![1, 2, 5]);
}

#[test]
fn test_result_pixel_is_common_ancestor() {
    let ctx = abcd::context();
    let tree1 = abcd::leaf(&ctx, A, LeafValue::FullMatch);
    let tree2 = abcd::leaf(&ctx, B, LeafValue::Fetched(set([3, 4])));

    let union = tree1.union(&tree2).unwrap();
    assert_eq!(union.root_pixel_id().unwrap(), Some(ROOT));
    assert_eq!(union.number_of_nodes().unwrap(), 1);
}

#[test]
fn test_union_with_full_match_claims_no_siblings() {
    // C holds items neither operand touches
    let ctx = abcd::context_with([(C, set([9]))]);
    let tree1 = abcd::leaf(&ctx, A, LeafValue::FullMatch);
    let tree2 = abcd::leaf(&ctx, B, LeafValue::Fetched(set([3, 4])));

    for union in [tree1.union(&tree2).unwrap(), tree2.union(&tree1).unwrap()] {
        assert_eq!(union.root_pixel_id().unwrap(), Some(ROOT));
        assert_eq!(sorted(&union.items().unwrap()), vec![1, 2, 3, 4, 5]);
        assert_eq!(union.stats().unwrap().full_match, 0);
    }
}

#[test]
fn test_union_with_covering_full_match_stays_full() {
    let ctx = abcd::context_with([(C, set([9]))]);
    let full = abcd::leaf(&ctx, A, LeafValue::FullMatch);
    let fine = abcd::leaf(&ctx, A0, LeafValue::Fetched(set([1])));

    let union = full.union(&fine).unwrap();
    assert_eq!(union.root_pixel_id().unwrap(), Some(A));
    assert_eq!(union.stats().unwrap().full_match, 1);
    assert_eq!(sorted(&union.items().unwrap()), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_deeper_pixel_wins() {
    let ctx = abcd::context();
    let coarse = abcd::leaf(&ctx, A, LeafValue::Fetched(set([1, 2, 4, 9])));
    let fine = abcd::leaf(&ctx, A0, LeafValue::Fetched(set([1, 2, 3])));

    // the coarse set is restricted to its own pixel first, dropping 9
    let result = coarse.difference(&fine).unwrap();
    assert_eq!(result.root_pixel_id().unwrap(), Some(A0));
    assert_eq!(sorted(&result.items().unwrap()), vec![4]);

    let result = coarse.intersect(&fine).unwrap();
    assert_eq!(result.root_pixel_id().unwrap(), Some(A0));
    assert_eq!(sorted(&result.items().unwrap()), vec![1, 2]);
}

#[test]
fn test_full_match_shortcut_keeps_coarse_items() {
    // intersecting with a full match copies the other side unchanged, even
    // when that side sits at a coarser pixel
    let ctx = abcd::context();
    let coarse = abcd::leaf(&ctx, A, LeafValue::Fetched(set([1, 5])));
    let full = abcd::leaf(&ctx, A0, LeafValue::FullMatch);

    let result = coarse.intersect(&full).unwrap();
    assert_eq!(result.root_pixel_id().unwrap(), Some(A0));
    assert_eq!(sorted(&result.items().unwrap()), vec![1, 5]);
}

#[test]
fn test_internal_trees_merge_by_pixel() {
    let ctx = abcd::context();
    let left = Hcqr::InMemory(MemoryHcqr::new(
        ctx.clone(),
        Some(TreeNode::internal(
            ROOT,
            vec![
                TreeNode::internal(A, vec![TreeNode::full_match(A0), TreeNode::full_match(A1)]),
                TreeNode::full_match(C),
            ],
        )),
        vec![],
    ));
    let right = Hcqr::InMemory(MemoryHcqr::new(
        ctx.clone(),
        Some(TreeNode::internal(
            ROOT,
            vec![TreeNode::internal(A, vec![TreeNode::fetched(A1, 0)]), TreeNode::fetched(B, 1)],
        )),
        vec![set([5]), set([3])],
    ));

    assert_eq!(sorted(&left.intersect(&right).unwrap().items().unwrap()), vec![5]);
    assert_eq!(sorted(&left.union(&right).unwrap().items().unwrap()), vec![1, 2, 3, 4, 5]);
    // C has no items; A0 stays, A1 loses 5
    assert_eq!(sorted(&left.difference(&right).unwrap().items().unwrap()), vec![1, 2, 3, 4]);
    assert_eq!(sorted(&right.difference(&left).unwrap().items().unwrap()), vec![3]);
}

#[test]
fn test_mismatched_internal_roots_are_fatal() {
    let ctx = abcd::context();
    let left = Hcqr::InMemory(MemoryHcqr::new(
        ctx.clone(),
        Some(TreeNode::internal(A, vec![TreeNode::full_match(A0)])),
        vec![],
    ));
    let right = Hcqr::InMemory(MemoryHcqr::new(
        ctx.clone(),
        Some(TreeNode::internal(ROOT, vec![TreeNode::full_match(B)])),
        vec![],
    ));
    assert!(matches!(left.union(&right), Err(HcqrError::InvariantViolation(_))));
}

#[test]
fn test_all_to_full_is_lossy() {
    let ctx = quad_context();
    let t = tree(&ctx, &[(16, LeafValue::Fetched(set([0]))), (5, LeafValue::PartialMatch(2))]);
    let full = t.all_to_full().unwrap();

    assert_eq!(full.number_of_nodes().unwrap(), t.number_of_nodes().unwrap());
    assert_ne!(full.items().unwrap(), t.items().unwrap());
    assert!(t.items().unwrap().is_subset(&full.items().unwrap()));
    assert_eq!(full.stats().unwrap().full_match, 2);
}

#[test]
fn test_compaction_merges_below_level_only() {
    let ctx = quad_context();
    // pixel 4's children 16 and 17 each hold a small fetched set
    let t = tree(
        &ctx,
        &[
            (16, LeafValue::Fetched(set([0, 16, 32, 48]))),
            (17, LeafValue::Fetched(set([1, 17, 33, 49]))),
        ],
    );

    let kept = t.compactified(1).unwrap();
    let merged = t.compactified(0).unwrap();
    assert_eq!(merged.items().unwrap(), t.items().unwrap());
    assert_eq!(kept.items().unwrap(), t.items().unwrap());
    assert!(merged.number_of_nodes().unwrap() <= kept.number_of_nodes().unwrap());
    // level 1 is not above 1, so nothing merges there
    assert_eq!(kept.number_of_nodes().unwrap(), 4);
}

#[test]
fn test_expansion_materializes_full_children() {
    let ctx = quad_context();
    let t = tree(&ctx, &[(4, LeafValue::FullMatch)]);
    let expanded = t.expanded(2).unwrap();

    assert_eq!(expanded.items().unwrap(), t.items().unwrap());
    let stats = expanded.stats().unwrap();
    assert_eq!(stats.full_match, 4);
    assert_eq!(stats.depth, 2);
}
