use crate::PixelBuffer;
use vek::Vec4;

const NEIGHBORS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Averages `color` with the valid 4-neighbors of (x, y) in the committed buffer.
///
/// A neighbor is valid if its alpha exceeds `threshold`. `seed_count` is the weight
/// of `color` itself, 1 to include the center value, 0 to ignore it. Returns `None`
/// if no neighbor qualified, otherwise the average with alpha set to 1.
pub fn denoise_texel<B: PixelBuffer + ?Sized>(
    buffer: &B,
    x: i32,
    y: i32,
    color: Vec4<f32>,
    seed_count: u32,
    threshold: f32,
) -> Option<Vec4<f32>> {
    let mut sum = if seed_count > 0 { color } else { Vec4::zero() };
    let mut count = seed_count;
    let mut valid = 0;

    for (dx, dy) in NEIGHBORS {
        if let Some(neighbor) = buffer.get(x + dx, y + dy) {
            if neighbor.w > threshold {
                sum += neighbor;
                count += 1;
                valid += 1;
            }
        }
    }

    if valid == 0 {
        return None;
    }

    let mut out = sum / count as f32;
    out.w = 1.0;
    Some(out)
}

/// One fill pass: every texel whose alpha is at or below `threshold` takes the average
/// of its valid neighbors. Reads the committed state, commits at the end.
///
/// Returns the number of texels filled.
pub fn denoise_pass<B: PixelBuffer + ?Sized>(buffer: &mut B, threshold: f32) -> usize {
    let mut filled = 0;
    for y in 0..buffer.height() as i32 {
        for x in 0..buffer.width() as i32 {
            let Some(center) = buffer.get(x, y) else {
                continue;
            };
            if center.w > threshold {
                continue;
            }
            if let Some(color) = denoise_texel(buffer, x, y, Vec4::zero(), 0, threshold) {
                buffer.set(x, y, color);
                filled += 1;
            }
        }
    }
    buffer.commit();
    filled
}

/// Runs `passes` fill passes, each growing the valid region by one texel.
pub fn denoise<B: PixelBuffer + ?Sized>(buffer: &mut B, passes: usize, threshold: f32) -> usize {
    (0..passes).map(|_| denoise_pass(buffer, threshold)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Texture;

    fn grey(v: f32) -> Vec4<f32> {
        Vec4::new(v, v, v, 1.0)
    }

    #[test]
    fn fills_from_valid_neighbors_only() {
        let mut tex = Texture::alloc(3, 3);
        tex.set(0, 1, grey(0.2));
        tex.set(2, 1, grey(0.6));
        tex.commit();

        let out = denoise_texel(&tex, 1, 1, Vec4::zero(), 0, 0.5).unwrap();
        assert!((out.x - 0.4).abs() < 1e-6);
        assert_eq!(out.w, 1.0);

        // Corner (0, 0) only sees (0, 1)
        let out = denoise_texel(&tex, 0, 0, Vec4::zero(), 0, 0.5).unwrap();
        assert!((out.x - 0.2).abs() < 1e-6);

        // (1, 0) has no valid neighbor
        assert!(denoise_texel(&tex, 1, 0, Vec4::zero(), 0, 0.5).is_none());
    }

    #[test]
    fn seed_count_includes_center() {
        let mut tex = Texture::alloc(2, 1);
        tex.set(1, 0, grey(1.0));
        tex.commit();

        let out = denoise_texel(&tex, 0, 0, grey(0.0), 1, 0.5).unwrap();
        assert!((out.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn fixed_point_once_neighbors_agree() {
        let mut tex = Texture::filled(3, 3, grey(0.7));
        let first = denoise_texel(&tex, 1, 1, grey(0.7), 1, 0.5).unwrap();
        let second = denoise_texel(&tex, 1, 1, first, 1, 0.5).unwrap();
        assert!((first - second).magnitude() < 1e-6);
        assert!((first.x - 0.7).abs() < 1e-6);

        // Nothing to fill in a fully valid buffer
        let before = tex.clone();
        assert_eq!(denoise(&mut tex, 3, 0.5), 0);
        assert_eq!(tex, before);
    }

    #[test]
    fn passes_grow_the_valid_region() {
        let mut tex = Texture::alloc(5, 1);
        tex.set(0, 0, grey(0.8));
        tex.commit();

        assert_eq!(denoise_pass(&mut tex, 0.5), 1);
        assert_eq!(tex.get(2, 0).unwrap().w, 0.0);
        assert_eq!(denoise(&mut tex, 3, 0.5), 3);
        assert!(tex.texels().iter().all(|t| t.w == 1.0 && (t.x - 0.8).abs() < 1e-6));
    }
}
