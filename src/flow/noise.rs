//! Curl-noise flow field, CPU reference
//!
//! The particle program evaluates exactly these functions in WGSL. Gradients
//! come from an integer hash rather than a permutation table so both sides
//! compute identical lattice gradients with nothing to upload.

use std::f32::consts::PI;

use glam::Vec3;

use super::uniforms::Wave;
use crate::graph::{Rgb, hue_to_rgb};

/// Step used by the central differences of [`curl_noise`]
pub const CURL_EPSILON: f32 = 0.1;

/// Offsets decorrelating the three potential components
pub const POTENTIAL_OFFSETS: [Vec3; 2] = [
    Vec3::new(31.416, -47.853, 12.793),
    Vec3::new(-233.145, -113.408, -185.31),
];

/// `(frequency, amplitude)` per octave, both falling off
pub const OCTAVES: [(f32, f32); 3] = [(1.0, 1.0), (0.5, 0.5), (0.25, 0.25)];

/// Colour added by a wave at full intensity
pub const WAVE_GAIN: f32 = 0.6;

const GRADIENTS: [Vec3; 12] = [
    Vec3::new(1.0, 1.0, 0.0),
    Vec3::new(-1.0, 1.0, 0.0),
    Vec3::new(1.0, -1.0, 0.0),
    Vec3::new(-1.0, -1.0, 0.0),
    Vec3::new(1.0, 0.0, 1.0),
    Vec3::new(-1.0, 0.0, 1.0),
    Vec3::new(1.0, 0.0, -1.0),
    Vec3::new(-1.0, 0.0, -1.0),
    Vec3::new(0.0, 1.0, 1.0),
    Vec3::new(0.0, -1.0, 1.0),
    Vec3::new(0.0, 1.0, -1.0),
    Vec3::new(0.0, -1.0, -1.0),
];

fn hash3(x: i32, y: i32, z: i32) -> u32 {
    let mut h = (x as u32).wrapping_mul(0x8da6_b343)
        ^ (y as u32).wrapping_mul(0xd816_3841)
        ^ (z as u32).wrapping_mul(0xcb1a_b31f);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^ (h >> 16)
}

fn corner(cell: [i32; 3], offset: [i32; 3], local: Vec3) -> f32 {
    let h = hash3(cell[0] + offset[0], cell[1] + offset[1], cell[2] + offset[2]);
    let gradient = GRADIENTS[(h % 12) as usize];
    let d = local - Vec3::new(offset[0] as f32, offset[1] as f32, offset[2] as f32);
    gradient.dot(d)
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Smooth lattice gradient noise, roughly in `[-1, 1]`, zero on lattice points
pub fn gradient_noise(p: Vec3) -> f32 {
    let floor = p.floor();
    let cell = [floor.x as i32, floor.y as i32, floor.z as i32];
    let local = p - floor;
    let (u, v, w) = (fade(local.x), fade(local.y), fade(local.z));

    let c000 = corner(cell, [0, 0, 0], local);
    let c100 = corner(cell, [1, 0, 0], local);
    let c010 = corner(cell, [0, 1, 0], local);
    let c110 = corner(cell, [1, 1, 0], local);
    let c001 = corner(cell, [0, 0, 1], local);
    let c101 = corner(cell, [1, 0, 1], local);
    let c011 = corner(cell, [0, 1, 1], local);
    let c111 = corner(cell, [1, 1, 1], local);

    let x00 = lerp(c000, c100, u);
    let x10 = lerp(c010, c110, u);
    let x01 = lerp(c001, c101, u);
    let x11 = lerp(c011, c111, u);
    lerp(lerp(x00, x10, v), lerp(x01, x11, v), w)
}

/// Vector potential whose curl drives the particles
pub fn potential(p: Vec3) -> Vec3 {
    Vec3::new(
        gradient_noise(p),
        gradient_noise(p + POTENTIAL_OFFSETS[0]),
        gradient_noise(p + POTENTIAL_OFFSETS[1]),
    )
}

/// Curl of [`potential`] by central differences
pub fn curl_noise(p: Vec3) -> Vec3 {
    let e = CURL_EPSILON;
    let dx = Vec3::new(e, 0.0, 0.0);
    let dy = Vec3::new(0.0, e, 0.0);
    let dz = Vec3::new(0.0, 0.0, e);

    let px = (potential(p + dx) - potential(p - dx)) / (2.0 * e);
    let py = (potential(p + dy) - potential(p - dy)) / (2.0 * e);
    let pz = (potential(p + dz) - potential(p - dz)) / (2.0 * e);

    Vec3::new(py.z - pz.y, pz.x - px.z, px.y - py.x)
}

/// Octave-summed displacement of a particle seeded at `origin`
pub fn flow_displacement(origin: Vec3, time: f32, scale: f32, amplitude: f32) -> Vec3 {
    let drift = Vec3::splat(time);
    let mut total = Vec3::ZERO;
    for (frequency, weight) in OCTAVES {
        total += curl_noise(origin * scale * frequency + drift) * weight;
    }
    total * amplitude
}

/// Brightness of `wave` at `p`: `max(0, cos(phase))²`
pub fn wave_intensity(p: Vec3, wave: &Wave, time: f32) -> f32 {
    let front = wave.offset + time * wave.speed;
    let phase = PI * (p.dot(wave.direction) - front) / wave.width;
    let c = phase.cos().max(0.0);
    c * c
}

/// `base` brightened by every wave passing through `p`, clamped to `[0, 1]`
pub fn wave_color(base: Rgb, p: Vec3, waves: &[Wave], time: f32) -> Rgb {
    let mut color = Vec3::from(base);
    for wave in waves {
        let intensity = wave_intensity(p, wave, time);
        color += Vec3::from(hue_to_rgb(wave.hue)) * intensity * WAVE_GAIN;
    }
    color.clamp(Vec3::ZERO, Vec3::ONE).to_array()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> impl Iterator<Item = Vec3> {
        (0..40).map(|i| {
            let t = i as f32;
            Vec3::new(t * 0.731 - 9.0, (t * 1.37).sin() * 6.0, t * -0.419 + 3.3)
        })
    }

    #[test]
    fn test_noise_zero_on_lattice() {
        for p in [Vec3::ZERO, Vec3::new(3.0, -2.0, 7.0), Vec3::new(-11.0, 5.0, -1.0)] {
            assert_eq!(gradient_noise(p), 0.0);
        }
    }

    #[test]
    fn test_noise_bounded_and_varied() {
        let values: Vec<f32> = sample_points().map(gradient_noise).collect();
        assert!(values.iter().all(|v| v.abs() <= 1.5));
        let spread = values.iter().fold(0.0_f32, |m, v| m.max(v.abs()));
        assert!(spread > 0.1, "noise is flat: {spread}");
    }

    #[test]
    fn test_noise_continuous() {
        for p in sample_points() {
            let a = gradient_noise(p);
            let b = gradient_noise(p + Vec3::splat(1e-3));
            assert!((a - b).abs() < 0.02);
        }
    }

    #[test]
    fn test_curl_is_divergence_free() {
        let e = CURL_EPSILON;
        for p in sample_points() {
            let div = (curl_noise(p + Vec3::X * e).x - curl_noise(p - Vec3::X * e).x
                + curl_noise(p + Vec3::Y * e).y
                - curl_noise(p - Vec3::Y * e).y
                + curl_noise(p + Vec3::Z * e).z
                - curl_noise(p - Vec3::Z * e).z)
                / (2.0 * e);
            assert!(div.abs() < 1e-3, "divergence {div} at {p}");
        }
    }

    #[test]
    fn test_octaves_fall_off() {
        for pair in OCTAVES.windows(2) {
            let ((f0, a0), (f1, a1)) = (pair[0], pair[1]);
            assert!(f1 < f0, "frequency rises: {OCTAVES:?}");
            assert!(a1 < a0, "amplitude rises: {OCTAVES:?}");
        }
    }

    #[test]
    fn test_displacement_scales_with_amplitude() {
        let origin = Vec3::new(12.0, -30.0, 44.0);
        let a = flow_displacement(origin, 1.5, 0.01, 10.0);
        let b = flow_displacement(origin, 1.5, 0.01, 20.0);
        assert!((b - a * 2.0).length() < 1e-3);
        assert_eq!(flow_displacement(origin, 1.5, 0.01, 0.0), Vec3::ZERO);
    }

    #[test]
    fn test_wave_peak_and_trough() {
        let wave = Wave {
            direction: Vec3::X,
            speed: 10.0,
            width: 50.0,
            hue: 0.0,
            offset: 0.0,
        };
        // Front at x = 20 after 2 seconds
        assert!((wave_intensity(Vec3::new(20.0, 7.0, -3.0), &wave, 2.0) - 1.0).abs() < 1e-5);
        assert!(wave_intensity(Vec3::new(70.0, 0.0, 0.0), &wave, 2.0) < 1e-5);
    }

    #[test]
    fn test_wave_color_clamped() {
        let wave = Wave {
            direction: Vec3::Y,
            speed: 0.0,
            width: 10.0,
            hue: 0.0,
            offset: 0.0,
        };
        let waves = [wave; 5];
        let color = wave_color([0.9, 0.2, 0.2], Vec3::ZERO, &waves, 0.0);
        assert_eq!(color[0], 1.0);
        assert!(color[1] < 1.0);
    }
}
