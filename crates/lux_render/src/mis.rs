//! Power-heuristic MIS weighting over the bidirectional technique family.

use crate::fullpath::FullPath;

/// Power-heuristic (beta = 2) weight of the technique that sampled this
/// full path, over all `(s, t)` splits of the same geometric path.
pub fn power_heuristic_weight(path: &FullPath<'_, '_>) -> f32 {
    weight_from_split(path, path.s())
}

/// Telescope the adjacent-split PDF ratios up and down from split `s`.
///
/// A zero ratio means every technique beyond it cannot produce the path
/// (a specular or delta vertex would have to be sampled by connection),
/// and the telescoping stops there.
pub(crate) fn weight_from_split(path: &FullPath<'_, '_>, s: usize) -> f32 {
    let n = path.n();
    let mut inv_weight = 1.0;

    // Techniques s+1 ..= n
    let mut ratio = 1.0;
    for i in s..n {
        ratio *= path.evaluate_full_path_pdf_ratio(i);
        if ratio == 0.0 || !ratio.is_finite() {
            break;
        }
        inv_weight += ratio * ratio;
    }

    // Techniques s-1 ..= 0
    let mut ratio = 1.0;
    for i in (0..s).rev() {
        let r = path.evaluate_full_path_pdf_ratio(i);
        if r == 0.0 {
            break;
        }
        ratio /= r;
        if !ratio.is_finite() {
            break;
        }
        inv_weight += ratio * ratio;
    }

    1.0 / inv_weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsdf::TransportDirection;
    use crate::fullpath::FullPath;
    use crate::geometry::geometry_term_with_visibility;
    use crate::pool::VertexPool;
    use crate::sampler::RandomSampler;
    use crate::subpath::Subpath;
    use crate::testutil::two_quad_scene;
    use lux_math::{Vec2, Vec3, EPS};

    /// W1 condition: over every split that can produce a sampled path with
    /// non-zero contribution, the telescoped weights sum to one.
    #[test]
    fn test_weights_sum_to_one() {
        let scene = two_quad_scene();
        let mut sampler = RandomSampler::from_seed(17);
        let mut pool = VertexPool::new();

        let mut checked_paths = 0;
        for _ in 0..1024 {
            pool.release_all();
            let mut light_subpath = Subpath::new(TransportDirection::LE);
            let mut eye_subpath = Subpath::new(TransportDirection::EL);
            light_subpath.sample(&scene, &mut sampler, &mut pool, 3, None);
            eye_subpath.sample(&scene, &mut sampler, &mut pool, 3, None);

            let s = light_subpath.num_vertices();
            let t = eye_subpath.num_vertices();
            let n = s + t;
            if n < 2 {
                continue;
            }

            // The connection edge must carry geometric throughput,
            // otherwise the ratio telescoping is void
            let g = geometry_term_with_visibility(
                &scene,
                &light_subpath.vertex(&pool, s - 1).geom,
                &eye_subpath.vertex(&pool, t - 1).geom,
            );
            if g.abs() < EPS {
                continue;
            }

            let path = FullPath::new(s, t, &light_subpath, &eye_subpath, &pool);
            let mut raster = Vec2::ZERO;
            if path.evaluate_unweighted_contribution(&scene, &mut raster) == Vec3::ZERO {
                continue;
            }
            if path.evaluate_full_path_pdf(s) < EPS {
                continue;
            }

            let mut sum = 0.0;
            for i in 0..=n {
                // Techniques that cannot produce the path carry exact-zero
                // factors; only they are excluded
                if path.evaluate_full_path_pdf(i) <= 0.0 {
                    continue;
                }
                sum += weight_from_split(&path, i);
            }
            assert!(
                (sum - 1.0).abs() < 1e-2,
                "weights sum to {sum} != 1 (s={s}, t={t})"
            );
            checked_paths += 1;
        }
        assert!(checked_paths > 0, "no full paths were checked");
    }

    /// The telescoped weight equals the direct normalized power-heuristic
    /// expression `p_s^2 / sum p_i^2`.
    #[test]
    fn test_weight_matches_direct_evaluation() {
        let scene = two_quad_scene();
        let mut sampler = RandomSampler::from_seed(29);
        let mut pool = VertexPool::new();

        let mut checked = 0;
        for _ in 0..512 {
            pool.release_all();
            let mut light_subpath = Subpath::new(TransportDirection::LE);
            let mut eye_subpath = Subpath::new(TransportDirection::EL);
            light_subpath.sample(&scene, &mut sampler, &mut pool, 3, None);
            eye_subpath.sample(&scene, &mut sampler, &mut pool, 3, None);

            let s = light_subpath.num_vertices();
            let t = eye_subpath.num_vertices();
            let n = s + t;
            if n < 2 {
                continue;
            }
            let g = geometry_term_with_visibility(
                &scene,
                &light_subpath.vertex(&pool, s - 1).geom,
                &eye_subpath.vertex(&pool, t - 1).geom,
            );
            if g.abs() < EPS {
                continue;
            }

            let path = FullPath::new(s, t, &light_subpath, &eye_subpath, &pool);
            let ps = path.evaluate_full_path_pdf(s);
            if ps < EPS {
                continue;
            }

            let mut denom = 0.0;
            for i in 0..=n {
                let pi = path.evaluate_full_path_pdf(i);
                denom += pi * pi;
            }
            let direct = ps * ps / denom;
            let telescoped = power_heuristic_weight(&path);
            assert!(
                (telescoped - direct).abs() < 1e-3 * direct.max(1e-3),
                "telescoped {telescoped} != direct {direct} (s={s}, t={t})"
            );
            checked += 1;
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_weight_in_unit_interval() {
        let scene = two_quad_scene();
        let mut sampler = RandomSampler::from_seed(23);
        let mut pool = VertexPool::new();

        for _ in 0..256 {
            pool.release_all();
            let mut light_subpath = Subpath::new(TransportDirection::LE);
            let mut eye_subpath = Subpath::new(TransportDirection::EL);
            light_subpath.sample(&scene, &mut sampler, &mut pool, 3, None);
            eye_subpath.sample(&scene, &mut sampler, &mut pool, 3, None);

            for s in 0..=light_subpath.num_vertices() {
                for t in 0..=eye_subpath.num_vertices() {
                    if s + t < 2 {
                        continue;
                    }
                    let path = FullPath::new(s, t, &light_subpath, &eye_subpath, &pool);
                    let w = power_heuristic_weight(&path);
                    assert!((0.0..=1.0 + 1e-6).contains(&w), "weight {w} out of range");
                }
            }
        }
    }
}
