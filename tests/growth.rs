//! Tree growth integration tests.
//!
//! Exercises the public API end to end and checks the build invariants:
//! conservation, leaf/depth caps, monotonic loss, prediction consistency,
//! and persistence round trips.

use approx::assert_abs_diff_eq;
use rand::prelude::*;

use sapling::{persist, ColumnarDataset, GrowerParams, Tree, TreeGrower};

fn unregularized(max_leaves: usize, max_depth: u32) -> GrowerParams {
    GrowerParams {
        reg_node: 0.0,
        reg_weight: 0.0,
        min_samples_leaf: 1,
        max_depth,
        max_leaves,
    }
}

/// Random sparse continuous dataset. Columns list their entries in
/// descending value order with values below 1.0, as the dataset builder
/// contract requires.
fn random_dataset(rng: &mut StdRng, n_rows: usize, n_cols: usize, density: f64) -> ColumnarDataset {
    let mut columns = Vec::with_capacity(n_cols);
    for _ in 0..n_cols {
        let mut entries: Vec<(u32, f32)> = Vec::new();
        for row in 0..n_rows as u32 {
            if rng.gen::<f64>() < density {
                entries.push((row, rng.gen::<f32>() * 0.99));
            }
        }
        entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        let (rows, values): (Vec<u32>, Vec<f32>) = entries.into_iter().unzip();
        columns.push((rows, values));
    }
    ColumnarDataset::continuous(n_rows, columns).unwrap()
}

fn random_gradients(rng: &mut StdRng, n_rows: usize) -> (Vec<f64>, Vec<f64>) {
    let grads = (0..n_rows).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let hess = (0..n_rows).map(|_| rng.gen_range(0.5..1.5)).collect();
    (grads, hess)
}

fn sum_of_leaf_losses(tree: &Tree) -> f64 {
    tree.nodes()
        .iter()
        .filter(|n| n.is_leaf())
        .map(|n| n.loss)
        .sum()
}

#[test]
fn four_instance_scenario() {
    // One continuous feature over four instances; gradients alternate sign
    // with the feature value, so the best split separates the low and high
    // pairs with a threshold near 0.5.
    let data = ColumnarDataset::continuous(4, vec![(vec![1, 3, 2, 0], vec![0.9, 0.8, 0.2, 0.1])])
        .unwrap();
    let grads = [1.0, -1.0, 1.0, -1.0];
    let hess = [1.0; 4];
    let mut predictions = [0.0; 4];

    let grower = TreeGrower::new(unregularized(2, 2));
    let tree = grower.grow(&data, &grads, &hess, &mut predictions).unwrap();

    assert!(tree.validate().is_ok());
    assert_eq!(tree.n_leaves(), 2);

    let split = tree.root().split.as_ref().unwrap();
    assert_abs_diff_eq!(split.rule.threshold, 0.6, epsilon = 1e-6);

    // The high-value pair descends left with positive aggregate weight, the
    // low-value pair stays right with negative aggregate weight.
    assert_abs_diff_eq!(tree.node(split.left).weight, 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(tree.node(split.right).weight, -1.0, epsilon = 1e-9);
    let expect = [-1.0, 1.0, -1.0, 1.0];
    for (got, want) in predictions.iter().zip(expect) {
        assert_abs_diff_eq!(*got, want, epsilon = 1e-9);
    }
}

#[test]
fn leaf_budget_of_one_yields_no_model() {
    let data = ColumnarDataset::continuous(4, vec![(vec![1, 3, 2, 0], vec![0.9, 0.8, 0.2, 0.1])])
        .unwrap();
    let grads = [1.0, -1.0, 1.0, -1.0];
    let hess = [1.0; 4];
    let mut predictions = [3.5; 4];

    let grower = TreeGrower::new(unregularized(1, 2));
    assert!(grower.grow(&data, &grads, &hess, &mut predictions).is_none());
    assert_eq!(predictions, [3.5; 4]);
}

#[test]
fn caps_hold_on_random_data() {
    let mut rng = StdRng::seed_from_u64(42);

    for trial in 0..20 {
        let n_rows = rng.gen_range(8..120);
        let n_cols = rng.gen_range(1..6);
        let data = random_dataset(&mut rng, n_rows, n_cols, 0.6);
        let (grads, hess) = random_gradients(&mut rng, n_rows);
        let mut predictions = vec![0.0; n_rows];

        let max_leaves = rng.gen_range(2..16);
        let max_depth = rng.gen_range(1..5);
        let grower = TreeGrower::new(unregularized(max_leaves, max_depth));

        let Some(tree) = grower.grow(&data, &grads, &hess, &mut predictions) else {
            continue;
        };

        tree.validate()
            .unwrap_or_else(|e| panic!("trial {trial}: invalid tree: {e:?}"));
        assert!(tree.n_leaves() >= 1);
        assert!(tree.n_leaves() <= max_leaves, "trial {trial}");
        for node in tree.nodes() {
            assert!(node.depth <= max_depth, "trial {trial}");
            if node.is_leaf() {
                assert!(node.n_instances >= 1, "trial {trial}");
            }
        }
    }
}

#[test]
fn conservation_holds_on_random_data() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..20 {
        let n_rows = rng.gen_range(8..120);
        let data = random_dataset(&mut rng, n_rows, 3, 0.5);
        let (grads, hess) = random_gradients(&mut rng, n_rows);
        let mut predictions = vec![0.0; n_rows];

        let grower = TreeGrower::new(unregularized(12, 4));
        let Some(tree) = grower.grow(&data, &grads, &hess, &mut predictions) else {
            continue;
        };

        for node in tree.nodes() {
            if let Some(split) = &node.split {
                let left = tree.node(split.left);
                let right = tree.node(split.right);
                assert_eq!(left.n_instances + right.n_instances, node.n_instances);
                assert_abs_diff_eq!(
                    left.sum_grad + right.sum_grad,
                    node.sum_grad,
                    epsilon = 1e-9
                );
                assert_abs_diff_eq!(
                    left.sum_hess + right.sum_hess,
                    node.sum_hess,
                    epsilon = 1e-9
                );
            }
        }
    }
}

#[test]
fn scoring_reproduces_training_predictions_exactly() {
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..20 {
        let n_rows = rng.gen_range(8..120);
        let data = random_dataset(&mut rng, n_rows, 4, 0.5);
        let (grads, hess) = random_gradients(&mut rng, n_rows);
        let mut predictions = vec![0.0; n_rows];

        let grower = TreeGrower::new(unregularized(10, 4));
        let Some(tree) = grower.grow(&data, &grads, &hess, &mut predictions) else {
            continue;
        };

        let mut scores = vec![0.0; n_rows];
        tree.predict_into(&data, &mut scores);
        assert_eq!(scores, predictions);
    }
}

#[test]
fn total_loss_is_monotone_in_the_leaf_budget() {
    // Leaf-wise growth is a greedy sequence of strictly loss-reducing
    // commits: a larger budget extends the same sequence, so the total
    // leaf loss can only go down.
    let mut rng = StdRng::seed_from_u64(23);
    let n_rows = 80;
    let data = random_dataset(&mut rng, n_rows, 3, 0.6);
    let (grads, hess) = random_gradients(&mut rng, n_rows);

    let mut previous = f64::INFINITY;
    for max_leaves in 2..10 {
        let mut predictions = vec![0.0; n_rows];
        let grower = TreeGrower::new(unregularized(max_leaves, 6));
        let Some(tree) = grower.grow(&data, &grads, &hess, &mut predictions) else {
            continue;
        };

        let total = sum_of_leaf_losses(&tree);
        assert!(
            total <= previous + 1e-9,
            "budget {max_leaves}: loss {total} above previous {previous}"
        );
        previous = total;

        // Each committed split reduced the total below the root's own loss.
        assert!(total < tree.root().loss + 1e-9);
    }
}

#[test]
fn persist_round_trip_on_grown_trees() {
    let n_rows = 60;
    let n_cols = 4;
    let grower = TreeGrower::new(unregularized(8, 4));

    let tree = (31..40)
        .find_map(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let data = random_dataset(&mut rng, n_rows, n_cols, 0.6);
            let (grads, hess) = random_gradients(&mut rng, n_rows);
            let mut predictions = vec![0.0; n_rows];
            grower.grow(&data, &grads, &hess, &mut predictions)
        })
        .expect("random data with mixed gradients should split");

    let names: Vec<String> = (0..n_cols).map(|c| format!("f{c}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    let mut buf = Vec::new();
    persist::write_tsv(&tree, &mut buf, &names).unwrap();
    let restored = persist::read_tsv(buf.as_slice(), &names).unwrap();

    assert!(restored.validate().is_ok());
    assert_eq!(restored.n_nodes(), tree.n_nodes());
    for (got, want) in restored.nodes().iter().zip(tree.nodes()) {
        assert_eq!(got.is_leaf(), want.is_leaf());
        assert_eq!(got.n_instances, want.n_instances);
        assert_eq!(got.depth, want.depth);
        assert_abs_diff_eq!(got.weight, want.weight, epsilon = 1e-3);
        assert_abs_diff_eq!(got.loss, want.loss, epsilon = 1e-3);
        if let (Some(restored_split), Some(split)) = (&got.split, &want.split) {
            assert_eq!(restored_split.rule.feature, split.rule.feature);
            assert_abs_diff_eq!(
                restored_split.rule.threshold,
                split.rule.threshold,
                epsilon = 1e-3
            );
            assert_eq!(restored_split.left, split.left);
            assert_eq!(restored_split.right, split.right);
        }
    }
}

#[test]
fn binary_mode_end_to_end() {
    // Two binary features over six instances; the first separates the
    // gradient signs cleanly, the second is noise.
    let data = ColumnarDataset::binary(6, vec![vec![0, 1, 2], vec![1, 4]]).unwrap();
    let grads = [2.0, 2.0, 2.0, -2.0, -2.0, -2.0];
    let hess = [1.0; 6];
    let mut predictions = [0.0; 6];

    let grower = TreeGrower::new(unregularized(4, 3));
    let tree = grower.grow(&data, &grads, &hess, &mut predictions).unwrap();

    assert!(tree.validate().is_ok());
    let split = tree.root().split.as_ref().unwrap();
    assert_eq!(split.rule.feature, 0);

    // Present rows share the feature and route left.
    for row in 0..3 {
        assert_abs_diff_eq!(predictions[row], -2.0, epsilon = 1e-9);
    }
    for row in 3..6 {
        assert_abs_diff_eq!(predictions[row], 2.0, epsilon = 1e-9);
    }

    let mut scores = vec![0.0; 6];
    tree.predict_into(&data, &mut scores);
    assert_eq!(scores.as_slice(), predictions.as_slice());
}

#[test]
fn regularization_damps_weights_and_growth() {
    let data = ColumnarDataset::continuous(4, vec![(vec![1, 3, 2, 0], vec![0.9, 0.8, 0.2, 0.1])])
        .unwrap();
    let grads = [1.0, -1.0, 1.0, -1.0];
    let hess = [1.0; 4];

    // Heavier weight regularization shrinks leaf weights toward zero.
    let mut light = [0.0; 4];
    let tree = TreeGrower::new(GrowerParams {
        reg_weight: 1.0,
        ..unregularized(2, 2)
    })
    .grow(&data, &grads, &hess, &mut light)
    .unwrap();
    let split = tree.root().split.as_ref().unwrap();
    assert_abs_diff_eq!(tree.node(split.left).weight, 2.0 / 3.0, epsilon = 1e-9);

    // A large per-leaf penalty wipes out the gain entirely.
    let mut none = [9.0; 4];
    let skipped = TreeGrower::new(GrowerParams {
        reg_node: 10.0,
        ..unregularized(2, 2)
    })
    .grow(&data, &grads, &hess, &mut none);
    assert!(skipped.is_none());
    assert_eq!(none, [9.0; 4]);
}
