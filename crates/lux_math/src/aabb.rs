use crate::{Ray, Vec3};

/// Axis-aligned bounding box for spatial acceleration structures (BVH).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An empty AABB (contains nothing, absorbs nothing under union).
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create an AABB from explicit bounds.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// The AABB containing a single point.
    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    /// The AABB of two corner points in any order.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Union with another AABB.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Union with a point.
    pub fn union_point(&self, p: Vec3) -> Aabb {
        Aabb {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    /// Whether the box contains at least one point.
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Either extreme corner: 0 selects `min`, 1 selects `max`.
    ///
    /// Used by the slab test, indexed by the ray direction sign mask.
    #[inline]
    pub fn bound(&self, i: usize) -> Vec3 {
        if i == 0 {
            self.min
        } else {
            self.max
        }
    }

    /// One of the eight corners of the box.
    pub fn corner(&self, i: usize) -> Vec3 {
        Vec3::new(
            self.bound(i & 1).x,
            self.bound((i >> 1) & 1).y,
            self.bound((i >> 2) & 1).z,
        )
    }

    /// Surface area of the box, zero for empty boxes.
    pub fn surface_area(&self) -> f32 {
        if !self.is_valid() {
            return 0.0;
        }
        let d = self.max - self.min;
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Center point of the box.
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Extent along each axis.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Slab test against a ray with precomputed reciprocal direction and
    /// per-axis sign mask (1 where the direction component is negative).
    ///
    /// Returns true when the ray segment `[min_t, max_t]` overlaps the box.
    pub fn intersect_ray(&self, ray: &Ray, inv_d: Vec3, neg: [usize; 3]) -> bool {
        let mut tmin = (self.bound(neg[0]).x - ray.o.x) * inv_d.x;
        let mut tmax = (self.bound(1 - neg[0]).x - ray.o.x) * inv_d.x;
        let tymin = (self.bound(neg[1]).y - ray.o.y) * inv_d.y;
        let tymax = (self.bound(1 - neg[1]).y - ray.o.y) * inv_d.y;

        if tmin > tymax || tymin > tmax {
            return false;
        }
        tmin = tmin.max(tymin);
        tmax = tmax.min(tymax);

        let tzmin = (self.bound(neg[2]).z - ray.o.z) * inv_d.z;
        let tzmax = (self.bound(1 - neg[2]).z - ray.o.z) * inv_d.z;

        if tmin > tzmax || tzmin > tmax {
            return false;
        }
        tmin = tmin.max(tzmin);
        tmax = tmax.min(tzmax);

        tmin < ray.max_t && tmax > ray.min_t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray_data(ray: &Ray) -> (Vec3, [usize; 3]) {
        let inv_d = Vec3::new(1.0 / ray.d.x, 1.0 / ray.d.y, 1.0 / ray.d.z);
        let neg = [
            (ray.d.x < 0.0) as usize,
            (ray.d.y < 0.0) as usize,
            (ray.d.z < 0.0) as usize,
        ];
        (inv_d, neg)
    }

    #[test]
    fn test_union() {
        let a = Aabb::from_points(Vec3::ZERO, Vec3::splat(5.0));
        let b = Aabb::from_points(Vec3::splat(3.0), Vec3::splat(10.0));
        let u = a.union(&b);
        assert_eq!(u.min, Vec3::ZERO);
        assert_eq!(u.max, Vec3::splat(10.0));

        let e = Aabb::EMPTY.union(&a);
        assert_eq!(e, a);
    }

    #[test]
    fn test_surface_area() {
        let b = Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        assert!((b.surface_area() - 22.0).abs() < 1e-6);
        assert_eq!(Aabb::EMPTY.surface_area(), 0.0);
    }

    #[test]
    fn test_longest_axis() {
        assert_eq!(
            Aabb::from_points(Vec3::ZERO, Vec3::new(10.0, 1.0, 1.0)).longest_axis(),
            0
        );
        assert_eq!(
            Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 10.0, 1.0)).longest_axis(),
            1
        );
        assert_eq!(
            Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 1.0, 10.0)).longest_axis(),
            2
        );
    }

    #[test]
    fn test_corner() {
        let b = Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        assert_eq!(b.corner(0), Vec3::ZERO);
        assert_eq!(b.corner(7), Vec3::ONE);
        assert_eq!(b.corner(1), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_intersect_ray() {
        let b = Aabb::from_points(Vec3::splat(-1.0), Vec3::ONE);

        let hit = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, 0.0, 100.0);
        let (inv_d, neg) = ray_data(&hit);
        assert!(b.intersect_ray(&hit, inv_d, neg));

        let away = Ray::new(Vec3::new(0.0, 0.0, -5.0), -Vec3::Z, 0.0, 100.0);
        let (inv_d, neg) = ray_data(&away);
        assert!(!b.intersect_ray(&away, inv_d, neg));

        let miss = Ray::new(Vec3::new(10.0, 0.0, -5.0), Vec3::Z, 0.0, 100.0);
        let (inv_d, neg) = ray_data(&miss);
        assert!(!b.intersect_ray(&miss, inv_d, neg));

        // A hit behind max_t does not count
        let clipped = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, 0.0, 1.0);
        let (inv_d, neg) = ray_data(&clipped);
        assert!(!b.intersect_ray(&clipped, inv_d, neg));
    }
}
