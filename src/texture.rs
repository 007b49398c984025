use image::{ImageBuffer, Pixel};
use nalgebra as na;
use na::{Vector2, Vector4};

/// Filtering used when a texture is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleMode {
    #[default]
    Nearest,
    Bilinear,
}

/// Anything a fragment shader can sample colors from.
///
/// Coordinates follow the usual mesh convention: (0, 0) is the bottom left corner, (1, 1)
/// the top right, and values outside [0, 1] repeat.
pub trait Texture: Send + Sync {
    fn sample(&self, uv: Vector2<f32>, mode: SampleMode) -> Vector4<f32>;
}

/// Wraps a coordinate into [0, size) texel space, v axis flipped, since image row 0 is the top.
fn to_texel_space(uv: Vector2<f32>, width: u32, height: u32) -> Vector2<f32> {
    let u = uv.x - uv.x.floor();
    let v = uv.y - uv.y.floor();
    return Vector2::new(u * width as f32, (1.0 - v) * height as f32);
}

/// In-memory images act as textures. Decoding them is left to the caller.
impl<P> Texture for ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    fn sample(&self, uv: Vector2<f32>, mode: SampleMode) -> Vector4<f32> {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return Vector4::zeros();
        }

        let fetch = |x: i64, y: i64| -> Vector4<f32> {
            // Repeat addressing for neighbours falling off the edge.
            let x = x.rem_euclid(width as i64) as u32;
            let y = y.rem_euclid(height as i64) as u32;
            let rgba = self.get_pixel(x, y).to_rgba();
            return Vector4::new(
                rgba[0] as f32 / 255.0,
                rgba[1] as f32 / 255.0,
                rgba[2] as f32 / 255.0,
                rgba[3] as f32 / 255.0,
            );
        };

        let texel = to_texel_space(uv, width, height);
        return match mode {
            SampleMode::Nearest => fetch(texel.x.floor() as i64, texel.y.floor() as i64),
            SampleMode::Bilinear => {
                // Texel centers sit at half-integer positions.
                let x = texel.x - 0.5;
                let y = texel.y - 0.5;
                let x_0 = x.floor();
                let y_0 = y.floor();
                let t_x = x - x_0;
                let t_y = y - y_0;
                let (x_0, y_0) = (x_0 as i64, y_0 as i64);
                let top = fetch(x_0, y_0) * (1.0 - t_x) + fetch(x_0 + 1, y_0) * t_x;
                let bottom = fetch(x_0, y_0 + 1) * (1.0 - t_x) + fetch(x_0 + 1, y_0 + 1) * t_x;
                top * (1.0 - t_y) + bottom * t_y
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use nalgebra::vector;

    fn checker() -> RgbaImage {
        // Top row: red, green. Bottom row: blue, white.
        let mut image = RgbaImage::new(2, 2);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        image.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
        image.put_pixel(1, 1, Rgba([255, 255, 255, 255]));
        return image;
    }

    #[test]
    fn nearest_uses_bottom_left_origin() {
        let texture = checker();
        assert_eq!(texture.sample(vector![0.25, 0.25], SampleMode::Nearest), vector![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(texture.sample(vector![0.75, 0.75], SampleMode::Nearest), vector![0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn coordinates_repeat() {
        let texture = checker();
        assert_eq!(
            texture.sample(vector![1.25, -0.75], SampleMode::Nearest),
            texture.sample(vector![0.25, 0.25], SampleMode::Nearest)
        );
    }

    #[test]
    fn bilinear_blends_at_texel_corner() {
        let texture = checker();
        // Dead center of the image weights all four texels equally.
        let color = texture.sample(vector![0.5, 0.5], SampleMode::Bilinear);
        assert_relative_eq!(color, vector![0.5, 0.5, 0.5, 1.0], epsilon = 1e-6);
        // Texel center reproduces the texel exactly.
        let color = texture.sample(vector![0.25, 0.75], SampleMode::Bilinear);
        assert_relative_eq!(color, vector![1.0, 0.0, 0.0, 1.0], epsilon = 1e-6);
    }

    #[test]
    fn rgb_images_are_opaque() {
        let texture = RgbImage::from_pixel(1, 1, Rgb([0, 51, 255]));
        assert_relative_eq!(
            texture.sample(vector![0.5, 0.5], SampleMode::Nearest),
            vector![0.0, 0.2, 1.0, 1.0],
            epsilon = 1e-6
        );
    }
}
