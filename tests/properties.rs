use autodiff::{Tensor, TileConfig, ops};
use proptest::prelude::*;

fn values(len: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-10.0f32..10.0, len)
}

/// Two same-shape buffers with a rank-2 shape.
fn pair() -> impl Strategy<Value = ((usize, usize), Vec<f32>, Vec<f32>)> {
    (1usize..5, 1usize..5).prop_flat_map(|(r, c)| (Just((r, c)), values(r * c), values(r * c)))
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1e-4 * (1.0 + a.abs().max(b.abs()))
}

proptest! {
    #[test]
    fn mul_matches_pointwise_with_closed_form_adjoints((shape, xs, ys) in pair()) {
        let a = Tensor::from_vec(xs.clone(), shape).unwrap();
        let b = Tensor::from_vec(ys.clone(), shape).unwrap();
        let c = (&a * &b).unwrap();
        c.backward();
        for i in 0..xs.len() {
            prop_assert_eq!(c.to_vec()[i], xs[i] * ys[i]);
            prop_assert_eq!(a.grad_vec()[i], ys[i]);
            prop_assert_eq!(b.grad_vec()[i], xs[i]);
        }
    }

    #[test]
    fn add_and_sub_route_unit_grads((shape, xs, ys) in pair()) {
        let a = Tensor::from_vec(xs.clone(), shape).unwrap();
        let b = Tensor::from_vec(ys.clone(), shape).unwrap();
        let c = (&a - &b).unwrap();
        c.backward();
        prop_assert!(a.grad_vec().iter().all(|g| *g == 1.0));
        prop_assert!(b.grad_vec().iter().all(|g| *g == -1.0));

        let d = (&a + &b).unwrap();
        for i in 0..xs.len() {
            prop_assert_eq!(d.to_vec()[i], xs[i] + ys[i]);
        }
    }

    #[test]
    fn broadcasting_against_one_element_sums_its_grad(xs in values(6), s in -5.0f32..5.0) {
        let a = Tensor::from_vec(xs, (2, 3)).unwrap();
        let k = Tensor::from_vec(vec![s], 1).unwrap();
        let c = (&a * &k).unwrap();
        let c_shape = c.shape();
        prop_assert_eq!(c_shape.dims(), &[2, 3]);
        c.backward();
        let expected: f32 = a.to_vec().iter().sum();
        prop_assert!(close(k.grad_vec()[0], expected));
        prop_assert!(a.grad_vec().iter().all(|g| *g == s));
    }

    #[test]
    fn view_round_trip_preserves_data(xs in values(12)) {
        let t = Tensor::from_vec(xs.clone(), (3, 4)).unwrap();
        t.view((2, 2, 3)).unwrap();
        prop_assert_eq!(t.shape().numel(), t.numel());
        t.view((3, 4)).unwrap();
        prop_assert_eq!(t.to_vec(), xs);
    }

    #[test]
    fn tiling_never_changes_the_product(
        (m, k, n) in (1usize..9, 1usize..9, 1usize..9),
        tile in 1usize..5,
        inner in 1usize..4,
        seed in any::<u64>(),
    ) {
        let fill = |len: usize, salt: u64| -> Vec<f32> {
            (0..len)
                .map(|i| (((i as u64 * 31 + salt + seed % 97) % 13) as f32) - 6.0)
                .collect()
        };
        let a = Tensor::from_vec(fill(m * k, 1), (m, k)).unwrap();
        let b = Tensor::from_vec(fill(k * n, 2), (k, n)).unwrap();
        let small = TileConfig { rows: tile, cols: tile, inner };
        let tiled = ops::matmul_with(&a, &b, small).unwrap();
        let plain = ops::matmul_with(&a, &b, TileConfig::default()).unwrap();
        // small integers, so the products are exact
        prop_assert_eq!(tiled.to_vec(), plain.to_vec());
    }
}
