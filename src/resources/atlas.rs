//! Cube map array creation from cross-layout atlases
//!
//! Each atlas is a 4x3 grid holding the six faces of one cube map:
//!
//! ```text
//!         +------+
//!         | top  |
//!  +------+------+------+------+
//!  | left |front |right | back |
//!  +------+------+------+------+
//!         |bottom|
//!         +------+
//! ```
//!
//! Atlas `i` becomes layers `6 * i .. 6 * i + 6` of a single array texture.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::Image;
use thiserror::Error;

pub const ATLAS_COLUMNS: u32 = 4;
pub const ATLAS_ROWS: u32 = 3;
pub const FACES_PER_CUBE: u32 = 6;

/// Atlas validation and splicing errors
#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("No atlas images given")]
    NoAtlases,
    #[error("Atlas {name} is {width}x{height}, which does not split into a 4x3 face grid")]
    NotDivisible {
        name: String,
        width: u32,
        height: u32,
    },
    #[error(
        "Atlas {index} ({name}) is {width}x{height} with {channels} channels, \
         expected {expected_width}x{expected_height} with {expected_channels}"
    )]
    SizeMismatch {
        index: usize,
        name: String,
        width: u32,
        height: u32,
        channels: u32,
        expected_width: u32,
        expected_height: u32,
        expected_channels: u32,
    },
    #[error("Atlases have {0} channels per pixel, 4 are required")]
    UnsupportedChannels(u32),
    #[error("Source index {index} out of bounds for atlas of {len} bytes")]
    SourceOutOfBounds { index: usize, len: usize },
    #[error("Destination index {index} out of bounds for face of {len} bytes")]
    DestinationOutOfBounds { index: usize, len: usize },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Cube map face in layer order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    Right,
    Left,
    Top,
    Bottom,
    Front,
    Back,
}

impl CubeFace {
    /// All faces, indexed by their layer offset within a cube
    pub const ALL: [CubeFace; 6] = [
        CubeFace::Right,
        CubeFace::Left,
        CubeFace::Top,
        CubeFace::Bottom,
        CubeFace::Front,
        CubeFace::Back,
    ];

    /// (column, row) of the face in the atlas grid
    pub fn grid_cell(self) -> (u32, u32) {
        match self {
            CubeFace::Right => (2, 1),
            CubeFace::Left => (0, 1),
            CubeFace::Top => (1, 0),
            CubeFace::Bottom => (1, 2),
            CubeFace::Front => (1, 1),
            CubeFace::Back => (3, 1),
        }
    }

    pub fn layer_offset(self) -> u32 {
        self as u32
    }
}

/// Geometry shared by every atlas of a set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceLayout {
    pub atlas_width: u32,
    pub atlas_height: u32,
    pub bytes_per_pixel: u32,
    pub face_width: u32,
    pub face_height: u32,
}

impl FaceLayout {
    /// Derive the face size of an atlas, rejecting sizes that leave a remainder
    pub fn for_atlas(image: &Image) -> Result<Self, AtlasError> {
        if image.width % ATLAS_COLUMNS != 0
            || image.height % ATLAS_ROWS != 0
            || image.width == 0
            || image.height == 0
        {
            return Err(AtlasError::NotDivisible {
                name: image.name.clone(),
                width: image.width,
                height: image.height,
            });
        }

        Ok(Self {
            atlas_width: image.width,
            atlas_height: image.height,
            bytes_per_pixel: image.bytes_per_pixel,
            face_width: image.width / ATLAS_COLUMNS,
            face_height: image.height / ATLAS_ROWS,
        })
    }

    /// Bytes in one extracted face
    pub fn face_len(&self) -> usize {
        self.face_width as usize * self.face_height as usize * self.bytes_per_pixel as usize
    }

    fn matches(&self, image: &Image) -> bool {
        image.width == self.atlas_width
            && image.height == self.atlas_height
            && image.bytes_per_pixel == self.bytes_per_pixel
    }
}

/// Check every atlas before anything touches the GPU
pub fn validate_atlases(images: &[Image]) -> Result<FaceLayout, AtlasError> {
    let first = images.first().ok_or(AtlasError::NoAtlases)?;
    let layout = FaceLayout::for_atlas(first)?;

    if let Some((index, image)) = images
        .iter()
        .enumerate()
        .find(|(_, image)| !layout.matches(image))
    {
        return Err(AtlasError::SizeMismatch {
            index,
            name: image.name.clone(),
            width: image.width,
            height: image.height,
            channels: image.bytes_per_pixel,
            expected_width: layout.atlas_width,
            expected_height: layout.atlas_height,
            expected_channels: layout.bytes_per_pixel,
        });
    }

    if layout.bytes_per_pixel != 4 {
        return Err(AtlasError::UnsupportedChannels(layout.bytes_per_pixel));
    }

    Ok(layout)
}

/// Copy one face out of `image` into `dst`, row by row.
///
/// `dst` is resized to [`FaceLayout::face_len`]; both the source and the
/// destination range of every row are bounds checked.
pub fn copy_face(
    image: &Image,
    layout: &FaceLayout,
    face: CubeFace,
    dst: &mut Vec<u8>,
) -> Result<(), AtlasError> {
    let bpp = layout.bytes_per_pixel as usize;
    let atlas_stride = layout.atlas_width as usize * bpp;
    let row_len = layout.face_width as usize * bpp;
    let (column, row) = face.grid_cell();
    let origin = (row * layout.face_height) as usize * atlas_stride
        + (column * layout.face_width) as usize * bpp;

    dst.resize(layout.face_len(), 0);

    for y in 0..layout.face_height as usize {
        let src_start = origin + y * atlas_stride;
        let src_end = src_start + row_len;
        if src_end > image.pixels.len() {
            return Err(AtlasError::SourceOutOfBounds {
                index: src_end - 1,
                len: image.pixels.len(),
            });
        }

        let dst_start = y * row_len;
        let dst_end = dst_start + row_len;
        if dst_end > dst.len() {
            return Err(AtlasError::DestinationOutOfBounds {
                index: dst_end - 1,
                len: dst.len(),
            });
        }

        dst[dst_start..dst_end].copy_from_slice(&image.pixels[src_start..src_end]);
    }

    Ok(())
}

/// GPU cube map array built from a set of atlases
#[derive(Debug, Clone, Copy)]
pub struct CubeMapArray {
    pub texture: TextureHandle,
    pub view: TextureViewHandle,
    pub sampler: SamplerHandle,
    pub cube_count: u32,
    pub face_width: u32,
    pub face_height: u32,
}

impl CubeMapArray {
    pub fn layer_count(&self) -> u32 {
        self.cube_count * FACES_PER_CUBE
    }
}

/// Validate `images`, create the array texture and upload every face.
///
/// The images are consumed and dropped once their faces are uploaded.
pub fn splice_atlases<B: GraphicsBackend>(
    backend: &mut B,
    images: Vec<Image>,
) -> Result<CubeMapArray, AtlasError> {
    let layout = validate_atlases(&images)?;
    let cube_count = images.len() as u32;

    log::info!("No. of cubemaps: {cube_count}");
    log::info!(
        "Cubemap resolution: {} x {}",
        layout.face_width,
        layout.face_height
    );
    log::debug!("No. of channels: {}", layout.bytes_per_pixel);

    let texture = backend.create_texture(&TextureDescriptor {
        label: Some("Skybox Cube Map Array".into()),
        width: layout.face_width,
        height: layout.face_height,
        array_layers: cube_count * FACES_PER_CUBE,
        mip_levels: 1,
        format: TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
    })?;

    let mut texels = Vec::with_capacity(layout.face_len());
    for (i, image) in images.iter().enumerate() {
        for face in CubeFace::ALL {
            copy_face(image, &layout, face, &mut texels)?;
            let layer = i as u32 * FACES_PER_CUBE + face.layer_offset();
            backend.write_texture_layer(
                texture,
                layer,
                &texels,
                layout.face_width,
                layout.face_height,
            )?;
        }
    }

    let view = backend.create_texture_view(
        texture,
        &TextureViewDescriptor {
            label: Some("Skybox Cube Map Array View".into()),
            dimension: TextureViewDimension::CubeArray,
            base_array_layer: 0,
            array_layer_count: Some(cube_count * FACES_PER_CUBE),
        },
    )?;

    let sampler = backend.create_sampler(&SamplerDescriptor {
        label: Some("Cubemap Sampler".into()),
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        mipmap_filter: FilterMode::Nearest,
        address_mode_u: AddressMode::ClampToEdge,
        address_mode_v: AddressMode::ClampToEdge,
        address_mode_w: AddressMode::ClampToEdge,
    })?;

    Ok(CubeMapArray {
        texture,
        view,
        sampler,
        cube_count,
        face_width: layout.face_width,
        face_height: layout.face_height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;

    /// Atlas whose every pixel encodes its own coordinates and `tag`
    fn coded_atlas(tag: u8, width: u32, height: u32) -> Image {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[x as u8, y as u8, tag, 255]);
            }
        }
        Image::from_raw(&format!("atlas-{tag}"), width, height, 4, pixels).unwrap()
    }

    #[test]
    fn test_face_size() {
        let layout = FaceLayout::for_atlas(&coded_atlas(0, 16, 12)).unwrap();
        assert_eq!((layout.face_width, layout.face_height), (4, 4));
        assert_eq!(layout.face_len(), 64);
    }

    #[test]
    fn test_not_divisible_rejected() {
        let err = FaceLayout::for_atlas(&coded_atlas(0, 18, 12)).unwrap_err();
        assert!(matches!(err, AtlasError::NotDivisible { width: 18, .. }));

        let err = FaceLayout::for_atlas(&coded_atlas(0, 16, 13)).unwrap_err();
        assert!(matches!(err, AtlasError::NotDivisible { height: 13, .. }));
    }

    #[test]
    fn test_copy_face_reproduces_sub_rectangle() {
        let atlas = coded_atlas(7, 16, 12);
        let layout = FaceLayout::for_atlas(&atlas).unwrap();
        let mut face = Vec::new();

        for cube_face in CubeFace::ALL {
            copy_face(&atlas, &layout, cube_face, &mut face).unwrap();
            let (column, row) = cube_face.grid_cell();
            for y in 0..4u32 {
                for x in 0..4u32 {
                    let i = ((y * 4 + x) * 4) as usize;
                    let expected = [(column * 4 + x) as u8, (row * 4 + y) as u8, 7, 255];
                    assert_eq!(&face[i..i + 4], &expected, "{cube_face:?} at ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn test_copy_face_bounds_checked() {
        let atlas = coded_atlas(0, 16, 12);
        let mut layout = FaceLayout::for_atlas(&atlas).unwrap();
        // Pretend the atlas is taller than its pixel buffer
        layout.atlas_height = 24;
        layout.face_height = 8;
        let mut face = Vec::new();
        let err = copy_face(&atlas, &layout, CubeFace::Bottom, &mut face).unwrap_err();
        assert!(matches!(err, AtlasError::SourceOutOfBounds { len: 768, .. }));
    }

    #[test]
    fn test_splice_ten_atlases() {
        let mut backend = DummyBackend::default();
        let images: Vec<Image> = (0..10).map(|i| coded_atlas(i, 16, 12)).collect();

        let cubes = splice_atlases(&mut backend, images).unwrap();
        assert_eq!(cubes.cube_count, 10);
        assert_eq!(cubes.layer_count(), 60);

        let desc = backend.texture_descriptor(cubes.texture).unwrap();
        assert_eq!((desc.width, desc.height, desc.array_layers), (4, 4, 60));
        assert_eq!(desc.mip_levels, 1);

        let writes = backend.layer_writes();
        assert_eq!(writes.len(), 60);
        for (n, write) in writes.iter().enumerate() {
            assert_eq!(write.layer, n as u32);
            assert_eq!(write.data.len(), 64);
            // Blue channel carries the atlas index
            assert_eq!(write.data[2], (n / 6) as u8);
        }
        // Layer 6 * 3 + 0 is the right face of atlas 3, whose first texel is (8, 4)
        assert_eq!(&writes[18].data[..4], &[8, 4, 3, 255]);

        let view = backend.view_descriptor(cubes.view).unwrap();
        assert_eq!(view.dimension, TextureViewDimension::CubeArray);

        let sampler = backend.sampler_descriptor(cubes.sampler).unwrap();
        assert_eq!(sampler.min_filter, FilterMode::Linear);
        assert_eq!(sampler.address_mode_w, AddressMode::ClampToEdge);
    }

    #[test]
    fn test_mismatched_atlases_create_nothing() {
        let mut backend = DummyBackend::default();
        let mut images: Vec<Image> = (0..5).map(|i| coded_atlas(i, 16, 12)).collect();
        images.push(coded_atlas(5, 32, 24));

        let err = splice_atlases(&mut backend, images).unwrap_err();
        assert!(matches!(err, AtlasError::SizeMismatch { index: 5, .. }));
        assert_eq!(backend.texture_count(), 0);
        assert!(backend.layer_writes().is_empty());
    }

    #[test]
    fn test_channel_mismatch_creates_nothing() {
        let mut backend = DummyBackend::default();
        let mut images: Vec<Image> = (0..3).map(|i| coded_atlas(i, 16, 12)).collect();
        images.push(Image::from_raw("rgb", 16, 12, 3, vec![0; 16 * 12 * 3]).unwrap());

        let err = splice_atlases(&mut backend, images).unwrap_err();
        assert!(matches!(
            err,
            AtlasError::SizeMismatch {
                index: 3,
                channels: 3,
                expected_channels: 4,
                ..
            }
        ));
        assert_eq!(backend.texture_count(), 0);
        assert!(backend.layer_writes().is_empty());
    }

    #[test]
    fn test_empty_and_three_channel_atlases_rejected() {
        let mut backend = DummyBackend::default();
        assert!(matches!(
            splice_atlases(&mut backend, Vec::new()),
            Err(AtlasError::NoAtlases)
        ));

        let rgb = Image::from_raw("rgb", 16, 12, 3, vec![0; 16 * 12 * 3]).unwrap();
        assert!(matches!(
            splice_atlases(&mut backend, vec![rgb]),
            Err(AtlasError::UnsupportedChannels(3))
        ));
        assert_eq!(backend.texture_count(), 0);
    }
}
