use super::*;

struct Adjacency(Vec<Vec<u32>>);

impl Graph for Adjacency {
    type Node = u32;

    fn child_count(&self, node: u32) -> usize {
        self.0.get(node as usize).map_or(0, Vec::len)
    }

    fn child_at(&self, node: u32, index: usize) -> Option<u32> {
        self.0.get(node as usize)?.get(index).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Pre(u32),
    Post(u32),
}

#[derive(Default)]
struct Recorder {
    events: Vec<Event>,
    fail_pre: Option<u32>,
    fail_post: Option<u32>,
    decline: Option<u32>,
}

impl GraphSink<Adjacency> for Recorder {
    type Error = String;

    fn pre_subgraph(&mut self, _graph: &Adjacency, node: u32) -> Result<bool, String> {
        self.events.push(Event::Pre(node));
        if self.fail_pre == Some(node) {
            return Err(format!("pre {node}"));
        }
        Ok(self.decline != Some(node))
    }

    fn post_subgraph(&mut self, _graph: &Adjacency, node: u32) -> Result<(), String> {
        self.events.push(Event::Post(node));
        if self.fail_post == Some(node) {
            return Err(format!("post {node}"));
        }
        Ok(())
    }
}

//      0
//    / | \
//   1  2  3
//  / \     \
// 4   5     6
fn tree() -> Adjacency {
    Adjacency(vec![
        vec![1, 2, 3],
        vec![4, 5],
        vec![],
        vec![6],
        vec![],
        vec![],
        vec![],
    ])
}

#[test]
fn visits_tree_in_nested_order() {
    use Event::*;
    let mut walker = GraphWalker::new(Direction::LeftToRight);
    let mut sink = Recorder::default();
    walker.walk(&tree(), 0, &mut sink).unwrap();

    assert_eq!(
        sink.events,
        vec![
            Pre(0),
            Pre(1),
            Pre(4),
            Post(4),
            Pre(5),
            Post(5),
            Post(1),
            Pre(2),
            Post(2),
            Pre(3),
            Pre(6),
            Post(6),
            Post(3),
            Post(0),
        ]
    );
    assert_eq!(walker.depth(), 0);
}

#[test]
fn every_node_visited_once_and_children_post_before_parent() {
    let g = tree();
    let mut walker = GraphWalker::new(Direction::LeftToRight);
    let mut sink = Recorder::default();
    walker.walk(&g, 0, &mut sink).unwrap();

    let pos = |e: Event| sink.events.iter().position(|&x| x == e).unwrap();
    for node in 0..7u32 {
        let pre = sink.events.iter().filter(|&&e| e == Event::Pre(node)).count();
        let post = sink.events.iter().filter(|&&e| e == Event::Post(node)).count();
        assert_eq!((pre, post), (1, 1), "node {node}");
        for &child in &g.0[node as usize] {
            assert!(pos(Event::Pre(node)) < pos(Event::Pre(child)));
            assert!(pos(Event::Post(child)) < pos(Event::Post(node)));
        }
    }
}

#[test]
fn right_to_left_reverses_siblings() {
    use Event::*;
    let mut walker = GraphWalker::new(Direction::RightToLeft);
    let mut sink = Recorder::default();
    walker.walk(&tree(), 0, &mut sink).unwrap();

    let pres: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            Pre(n) => Some(*n),
            Post(_) => None,
        })
        .collect();
    assert_eq!(pres, vec![0, 3, 6, 2, 1, 5, 4]);
}

#[test]
fn shared_node_is_visited_once_per_walk() {
    // 0 -> {1, 2}, both 1 and 2 -> 3
    let g = Adjacency(vec![vec![1, 2], vec![3], vec![3], vec![]]);
    let mut walker = GraphWalker::new(Direction::LeftToRight);
    let mut sink = Recorder::default();
    walker.walk(&g, 0, &mut sink).unwrap();

    let pre3 = sink.events.iter().filter(|&&e| e == Event::Pre(3)).count();
    let post3 = sink.events.iter().filter(|&&e| e == Event::Post(3)).count();
    assert_eq!((pre3, post3), (1, 1));
    assert_eq!(sink.events.len(), 8);
    assert!(!walker.can_enter(3));

    // A new walk starts a fresh epoch.
    let mut again = Recorder::default();
    walker.walk(&g, 0, &mut again).unwrap();
    assert_eq!(again.events, sink.events);
}

#[test]
fn cycles_terminate() {
    // 0 -> 1 -> 2 -> 0, and 2 -> 2
    let g = Adjacency(vec![vec![1], vec![2], vec![0, 2]]);
    let mut walker = GraphWalker::new(Direction::LeftToRight);
    let mut sink = Recorder::default();
    walker.walk(&g, 0, &mut sink).unwrap();

    use Event::*;
    assert_eq!(
        sink.events,
        vec![Pre(0), Pre(1), Pre(2), Post(2), Post(1), Post(0)]
    );
    for n in 0..3 {
        assert!(!walker.is_entered(n));
    }
}

#[test]
fn declined_descent_still_posts() {
    use Event::*;
    let mut walker = GraphWalker::new(Direction::LeftToRight);
    let mut sink = Recorder {
        decline: Some(1),
        ..Recorder::default()
    };
    walker.walk(&tree(), 0, &mut sink).unwrap();

    assert_eq!(&sink.events[..3], &[Pre(0), Pre(1), Post(1)]);
    assert!(!sink.events.contains(&Pre(4)));
    assert!(!sink.events.contains(&Pre(5)));
}

#[test]
fn pre_error_leaves_every_entered_node() {
    let mut walker = GraphWalker::new(Direction::LeftToRight);
    let mut sink = Recorder {
        fail_pre: Some(5),
        ..Recorder::default()
    };
    let err = walker.walk(&tree(), 0, &mut sink).unwrap_err();
    assert_eq!(err, "pre 5");

    assert_eq!(walker.depth(), 0);
    for n in 0..7 {
        assert!(!walker.is_entered(n), "node {n} left entered");
    }
    assert!(!sink.events.contains(&Event::Post(1)));
    assert!(!sink.events.contains(&Event::Pre(2)));
}

#[test]
fn post_error_leaves_every_entered_node() {
    let mut walker = GraphWalker::new(Direction::LeftToRight);
    let mut sink = Recorder {
        fail_post: Some(6),
        ..Recorder::default()
    };
    assert!(walker.walk(&tree(), 0, &mut sink).is_err());
    assert_eq!(walker.depth(), 0);
    for n in 0..7 {
        assert!(!walker.is_entered(n));
    }

    // The walker is reusable after a failure.
    let mut ok = Recorder::default();
    walker.walk(&tree(), 0, &mut ok).unwrap();
    assert_eq!(ok.events.len(), 14);
}

#[test]
fn missing_children_are_skipped() {
    struct Sparse;
    impl Graph for Sparse {
        type Node = u32;
        fn child_count(&self, node: u32) -> usize {
            if node == 0 { 3 } else { 0 }
        }
        fn child_at(&self, _node: u32, index: usize) -> Option<u32> {
            (index != 1).then_some(10 + index as u32)
        }
    }
    struct Count(usize);
    impl GraphSink<Sparse> for Count {
        type Error = ();
        fn pre_subgraph(&mut self, _: &Sparse, _: u32) -> Result<bool, ()> {
            self.0 += 1;
            Ok(true)
        }
        fn post_subgraph(&mut self, _: &Sparse, _: u32) -> Result<(), ()> {
            Ok(())
        }
    }

    let mut walker = GraphWalker::new(Direction::LeftToRight);
    let mut sink = Count(0);
    walker.walk(&Sparse, 0, &mut sink).unwrap();
    assert_eq!(sink.0, 3);
}

#[test]
fn deep_chain_does_not_recurse() {
    let n = 100_000u32;
    let mut adj: Vec<Vec<u32>> = (0..n).map(|i| vec![i + 1]).collect();
    adj.push(vec![]);
    let g = Adjacency(adj);

    struct Depth(usize, usize);
    impl GraphSink<Adjacency> for Depth {
        type Error = ();
        fn pre_subgraph(&mut self, _: &Adjacency, _: u32) -> Result<bool, ()> {
            self.0 += 1;
            self.1 = self.1.max(self.0);
            Ok(true)
        }
        fn post_subgraph(&mut self, _: &Adjacency, _: u32) -> Result<(), ()> {
            self.0 -= 1;
            Ok(())
        }
    }

    let mut walker = GraphWalker::new(Direction::LeftToRight);
    let mut sink = Depth(0, 0);
    walker.walk(&g, 0, &mut sink).unwrap();
    assert_eq!(sink.1, n as usize + 1);
    assert_eq!(sink.0, 0);
}

#[test]
fn unreached_nodes_are_not_tracked_after_a_walk() {
    let wide = Adjacency(vec![vec![1, 2, 3], vec![4], vec![], vec![], vec![]]);
    let narrow = Adjacency(vec![vec![2], vec![], vec![]]);
    let mut walker = GraphWalker::new(Direction::LeftToRight);

    walker.walk(&wide, 0, &mut Recorder::default()).unwrap();
    assert_eq!(walker.tracked_nodes(), 5);

    walker.walk(&narrow, 0, &mut Recorder::default()).unwrap();
    assert_eq!(walker.tracked_nodes(), 2);
    assert!(walker.can_enter(1));

    let mut failing = Recorder {
        fail_pre: Some(2),
        ..Recorder::default()
    };
    assert!(walker.walk(&wide, 0, &mut failing).is_err());
    assert_eq!(walker.tracked_nodes(), 4);
    assert!(!walker.is_entered(1));
}
