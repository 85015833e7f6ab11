use super::testutils::{generate_dense, generate_sparse, map_graph, seeded_rng};
use super::*;
use rand::Rng;
use std::collections::HashMap;

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

fn ids(ss: &[&str]) -> Vec<NodeId> {
    ss.iter().map(|s| id(s)).collect()
}

fn graphs_equal(g: &Graph, h: &Graph) -> bool {
    if g.nodes() != h.nodes() {
        return false;
    }
    g.nodes().iter().all(|n| g.edges(n) == h.edges(n))
}

fn sorted(mut nodes: Vec<NodeId>) -> Vec<NodeId> {
    nodes.sort();
    nodes
}

fn random_node<R: Rng>(g: &Graph, rng: &mut R) -> NodeId {
    g.nodes()[rng.gen_range(0..g.nodes().len())].clone()
}

// ===== Graph Operation Tests =====

#[test]
fn test_transpose() {
    let g = map_graph(HashMap::from([
        (id("a"), ids(&["b"])),
        (id("b"), vec![]),
    ]));

    let expected = map_graph(HashMap::from([
        (id("a"), vec![]),
        (id("b"), ids(&["a"])),
    ]));

    assert!(graphs_equal(&g.transpose(), &expected));
}

#[test]
fn test_transpose_roundtrip() {
    let mut rng = seeded_rng("test_transpose_roundtrip");
    for _ in 0..50 {
        let g = generate_sparse(&mut rng, 10).graph();
        let tt = g.transpose().transpose();

        // Edge-equivalent: per-node edge multisets match.
        assert_eq!(g.nodes(), tt.nodes());
        for n in g.nodes() {
            assert_eq!(
                sorted(g.edges(n).to_vec()),
                sorted(tt.edges(n).to_vec()),
                "edge mismatch at {:?}",
                n
            );
        }
    }
}

#[test]
fn test_union_and_intersect() {
    let g = map_graph(HashMap::from([
        (id("a"), ids(&["b", "c"])),
        (id("b"), ids(&["a"])),
        (id("c"), vec![]),
    ]));
    let h = map_graph(HashMap::from([
        (id("a"), ids(&["c", "c", "d"])),
        (id("d"), ids(&["a"])),
    ]));

    let u = g.union(&h);
    assert_eq!(u.nodes(), ids(&["a", "b", "c", "d"]));
    assert_eq!(u.edges(&id("a")), ids(&["b", "c", "d"]));
    assert_eq!(u.edges(&id("b")), ids(&["a"]));
    assert_eq!(u.edges(&id("d")), ids(&["a"]));

    let i = g.intersect(&h);
    assert_eq!(i.nodes(), ids(&["a", "b", "c", "d"]));
    assert_eq!(i.edges(&id("a")), ids(&["c"]));
    assert_eq!(i.edges(&id("b")), &[] as &[NodeId]);
    assert_eq!(i.edges(&id("d")), &[] as &[NodeId]);
}

#[test]
fn test_reachable_graph() {
    // b -> c is reported but c is reached; d is unreachable.
    let map = HashMap::from([
        (id("a"), ids(&["b"])),
        (id("b"), ids(&["c", "a"])),
        (id("c"), vec![]),
        (id("d"), ids(&["a"])),
    ]);

    let g = reachable_graph(&id("a"), |n| map.get(n).cloned().unwrap_or_default());

    assert_eq!(sorted(g.nodes().to_vec()), ids(&["a", "b", "c"]));
    assert_eq!(g.edges(&id("b")), ids(&["c", "a"]));
    assert_eq!(g.edges(&id("d")), &[] as &[NodeId]);
}

#[test]
fn test_reachable_graph_preserves_asymmetry() {
    // a advertises b, but b does not advertise a back.
    let map = HashMap::from([(id("a"), ids(&["b"])), (id("b"), vec![])]);

    let g = reachable_graph(&id("a"), |n| map.get(n).cloned().unwrap_or_default());

    assert_eq!(g.edges(&id("a")), ids(&["b"]));
    assert_eq!(g.edges(&id("b")), &[] as &[NodeId]);
}

#[test]
fn test_connected() {
    let connected = map_graph(HashMap::from([
        (id("a"), ids(&["b"])),
        (id("b"), vec![]),
        (id("c"), ids(&["b"])),
    ]));
    assert!(connected.connected());

    let split = map_graph(HashMap::from([
        (id("a"), ids(&["b"])),
        (id("b"), vec![]),
        (id("c"), vec![]),
    ]));
    assert!(!split.connected());

    assert!(map_graph(HashMap::new()).connected());
}

// ===== Shortest Path Tests =====

/// Check that the distance to each node is the lowest value consistent
/// with the distances to its predecessors, and that each recorded initial
/// hop is a legitimate witness.
fn check_shortest_paths(g: &Graph, sps: &HashMap<NodeId, ShortestPath>) {
    struct Implied {
        min_distance: usize,
        initials: Vec<NodeId>,
    }

    let mut implied: HashMap<NodeId, Implied> = HashMap::new();
    let mut found_dist_zero = false;

    for n in g.nodes() {
        let Some(nsp) = sps.get(n) else {
            // n was not reachable
            continue;
        };

        if nsp.distance == 0 {
            assert!(!found_dist_zero, "two distance-zero nodes");
            found_dist_zero = true;
        }

        for m in g.edges(n) {
            let candidate = nsp.distance + 1;
            let isp = implied.entry(m.clone()).or_insert(Implied {
                min_distance: candidate,
                initials: Vec::new(),
            });

            if isp.min_distance < candidate {
                // already found a shorter implied distance to m
                continue;
            }
            if candidate < isp.min_distance {
                isp.min_distance = candidate;
                isp.initials.clear();
            }

            let initial = if nsp.distance == 0 {
                m.clone()
            } else {
                nsp.initial.clone()
            };
            isp.initials.push(initial);
        }
    }

    for (n, isp) in &implied {
        let sp = sps.get(n).expect("implied-reachable node missing");
        if sp.distance != 0 {
            assert_eq!(isp.min_distance, sp.distance, "incorrect distance on {:?}", n);
            assert!(
                isp.initials.contains(&sp.initial),
                "initial {:?} not a witness for {:?}",
                sp.initial,
                n
            );
        } else {
            assert_eq!(n, &sp.initial);
        }
    }

    // Implied reachability should match.
    for (n, sp) in sps {
        if sp.distance != 0 {
            assert!(implied.contains_key(n));
        }
    }
}

#[test]
fn test_find_shortest_paths() {
    fn check<R: Rng>(g: Graph, rng: &mut R) {
        let start = random_node(&g, rng);
        let sps = find_shortest_paths(&g, &start);
        check_shortest_paths(&g, &sps);

        // Stability
        assert_eq!(sps, find_shortest_paths(&g, &start));
    }

    let mut rng = seeded_rng("test_find_shortest_paths");
    for _ in 0..100 {
        check(generate_sparse(&mut rng, 10).graph(), &mut rng);
        check(generate_dense(&mut rng, 10).graph(), &mut rng);
    }
}

#[test]
fn test_shortest_paths_first_ring_initials() {
    // a -> b -> c: the initial hop toward c must be b, not a.
    let g = map_graph(HashMap::from([
        (id("a"), ids(&["b"])),
        (id("b"), ids(&["c"])),
        (id("c"), vec![]),
    ]));

    let sps = find_shortest_paths(&g, &id("a"));
    assert_eq!(sps[&id("a")], ShortestPath { distance: 0, initial: id("a") });
    assert_eq!(sps[&id("b")], ShortestPath { distance: 1, initial: id("b") });
    assert_eq!(sps[&id("c")], ShortestPath { distance: 2, initial: id("b") });
}

// ===== Pseudo-Central Node Tests =====

/// The eccentricity of a node: its maximum shortest-path distance to any
/// other node.
fn eccentricity(g: &Graph, n: &NodeId) -> usize {
    find_shortest_paths(g, n)
        .values()
        .map(|sp| sp.distance)
        .max()
        .unwrap_or(0)
}

/// The true central nodes: those with minimal eccentricity.
fn central_nodes(g: &Graph) -> Vec<NodeId> {
    let mut min_ecc = usize::MAX;
    let mut res = Vec::new();

    for n in g.nodes() {
        let ecc = eccentricity(g, n);
        if ecc <= min_ecc {
            if ecc < min_ecc {
                min_ecc = ecc;
                res.clear();
            }
            res.push(n.clone());
        }
    }

    res
}

#[test]
fn test_find_pseudo_central_node() {
    let mut rng = seeded_rng("test_find_pseudo_central_node");

    // With every node a witness, the pseudo-central node is the true
    // central node with the lowest id. The generated graphs are
    // symmetric, so forward and transposed distances agree.
    let check = |g: Graph| {
        assert_eq!(
            find_pseudo_central_node(&g, 10),
            Some(sorted(central_nodes(&g))[0].clone())
        );

        // Stability with a strict witness sample.
        assert_eq!(
            find_pseudo_central_node(&g, 3),
            find_pseudo_central_node(&g, 3)
        );
    };

    for _ in 0..100 {
        check(generate_sparse(&mut rng, 10).graph());
        check(generate_dense(&mut rng, 10).graph());
    }
}

fn linear_graph(n: usize) -> Graph {
    let mut map: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut prev = NodeId::from("0");

    for i in 1..n {
        let next = NodeId::from(i.to_string());
        map.entry(prev.clone()).or_default().push(next.clone());
        map.entry(next.clone()).or_default().push(prev.clone());
        prev = next;
    }

    map_graph(map)
}

#[test]
fn test_find_pseudo_central_node_of_linear_graph() {
    assert_eq!(
        find_pseudo_central_node(&linear_graph(101), 10),
        Some(id("50"))
    );
    assert_eq!(
        find_pseudo_central_node(&linear_graph(101), 11),
        Some(id("50"))
    );
}

#[test]
fn test_find_pseudo_central_node_empty() {
    assert_eq!(find_pseudo_central_node(&map_graph(HashMap::new()), 10), None);
}

// ===== Spanning Tree Tests =====

/// Validate tree shape: correct parent back-pointers, every node visited
/// exactly once from the root.
fn check_tree_node(
    tree: &SpanningTree,
    node: &NodeId,
    parent: Option<&NodeId>,
    remaining: &mut Vec<NodeId>,
) {
    assert_eq!(tree.parent(node), parent);
    let pos = remaining
        .iter()
        .position(|n| n == node)
        .unwrap_or_else(|| panic!("node visited twice or absent: {:?}", node));
    remaining.swap_remove(pos);

    for child in tree.children(node) {
        check_tree_node(tree, child, Some(node), remaining);
    }
}

fn check_tree(tree: &SpanningTree, root: &NodeId) {
    let mut remaining: Vec<NodeId> = tree.node_ids().cloned().collect();
    check_tree_node(tree, root, None, &mut remaining);
    assert!(remaining.is_empty(), "unreached tree nodes: {:?}", remaining);
}

#[test]
fn test_make_bushy_spanning_tree() {
    let mut rng = seeded_rng("test_make_bushy_spanning_tree");

    let check = |g: Graph, witnesses: usize, limit: usize| {
        let root = find_pseudo_central_node(&g, witnesses).expect("non-empty graph");
        let tree = make_bushy_spanning_tree(&g, &root, limit);

        // Spans exactly the graph's nodes.
        let gnodes = sorted(g.nodes().to_vec());
        assert_eq!(gnodes, sorted(tree.directed().nodes().to_vec()));

        // Undirected reachability from the root covers everything.
        let undirected = tree.undirected();
        let r = reachable_graph(&root, |n| undirected.edges(n).to_vec());
        assert_eq!(gnodes, sorted(r.nodes().to_vec()));

        check_tree(&tree, &root);

        // Stability
        assert!(graphs_equal(
            &tree.directed(),
            &make_bushy_spanning_tree(&g, &root, limit).directed()
        ));
    };

    for _ in 0..100 {
        check(generate_sparse(&mut rng, 10).graph(), 4, 2);
        check(generate_dense(&mut rng, 10).graph(), 4, 2);
    }

    // Some nice big graphs, for luck
    check(generate_sparse(&mut rng, 100).graph(), 10, 3);
    check(generate_dense(&mut rng, 100).graph(), 10, 3);
}

#[test]
fn test_bushy_tree_respects_limit_when_feasible() {
    // Star-free line: every node has degree <= 2, so a child limit of 2
    // can always be honored.
    let g = linear_graph(20);
    let tree = make_bushy_spanning_tree(&g, &id("0"), 2);

    for n in tree.node_ids() {
        assert!(tree.children(n).len() <= 2);
    }
    check_tree(&tree, &id("0"));
}

#[test]
fn test_bushy_tree_defers_past_full_parent() {
    // Root r sees a, b, c directly; with a child limit of 2, one of them
    // must attach under a sibling instead.
    let g = map_graph(HashMap::from([
        (id("r"), ids(&["a", "b", "c"])),
        (id("a"), ids(&["r", "b", "c"])),
        (id("b"), ids(&["r", "a", "c"])),
        (id("c"), ids(&["r", "a", "b"])),
    ]));

    let tree = make_bushy_spanning_tree(&g, &id("r"), 2);
    assert_eq!(tree.children(&id("r")), ids(&["a", "b"]));
    assert_eq!(tree.parent(&id("c")), Some(&id("a")));
    check_tree(&tree, &id("r"));
}
