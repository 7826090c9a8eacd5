//! Boundary to the remote AI shadow-refinement service
//!
//! The transport itself is not part of this crate. [`RefineRequest`] carries
//! the payload the service expects (a PNG of the current raster, an optional
//! black/white PNG mask and the scene prompts), a [`RefineBackend`] delivers
//! it, and [`refine_shadows`] turns whatever comes back (a URL to download or
//! an inline base64 image) into either a replacement raster or
//! [`RefinementUnavailable`](ChromaShadeError::RefinementUnavailable).
//! The caller's raster is never modified on failure.

use crate::{
    error::{ChromaShadeError, Result},
    services::ImageIOService,
    types::{BitMask, Raster},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Scene hint selecting the prompt pair sent to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scene {
    #[default]
    General,
    Building,
    Portrait,
    Object,
}

impl Scene {
    #[must_use]
    pub fn prompt(self) -> &'static str {
        match self {
            Self::General => "remove shadow, clean background, natural lighting, high quality",
            Self::Building => {
                "remove shadow from building facade, architectural photography, even lighting, clean wall, high quality"
            },
            Self::Portrait => {
                "remove shadow from face, soft studio lighting, natural skin tone, high quality, professional portrait"
            },
            Self::Object => {
                "remove shadow, product photography, white studio lighting, clean background, high quality"
            },
        }
    }

    #[must_use]
    pub fn negative_prompt(self) -> &'static str {
        match self {
            Self::General => "shadow, dark, artifacts, blur, low quality",
            Self::Building => "shadow, dark, artifacts, blur, low quality, distorted structure",
            Self::Portrait => {
                "shadow, dark, artifacts, blur, low quality, unnatural skin, distorted face"
            },
            Self::Object => "shadow, dark, artifacts, blur, low quality, noise",
        }
    }
}

impl std::str::FromStr for Scene {
    type Err = ChromaShadeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "general" => Ok(Self::General),
            "building" => Ok(Self::Building),
            "portrait" => Ok(Self::Portrait),
            "object" => Ok(Self::Object),
            other => Err(ChromaShadeError::invalid_config(format!(
                "unknown scene '{}' (expected general, building, portrait or object)",
                other
            ))),
        }
    }
}

/// Encoded payload for one refinement call
#[derive(Debug, Clone)]
pub struct RefineRequest {
    /// PNG of the raster to refine, alpha preserved
    pub image_png: Vec<u8>,
    /// Black/white PNG of the painted mask, same size as the image
    pub mask_png: Option<Vec<u8>>,
    pub scene: Scene,
    width: u32,
    height: u32,
}

impl RefineRequest {
    /// Encode `raster` and the optional `mask` for the service
    ///
    /// # Errors
    /// - `mask` dimensions differ from the raster
    /// - PNG encoding fails
    pub fn new(raster: &Raster, mask: Option<&BitMask>, scene: Scene) -> Result<Self> {
        let mask_png = match mask {
            Some(m) if m.dimensions() != raster.dimensions() => {
                return Err(ChromaShadeError::invalid_dimensions(format!(
                    "mask is {}x{} but image is {}x{}",
                    m.width(),
                    m.height(),
                    raster.width(),
                    raster.height()
                )));
            },
            Some(m) => Some(ImageIOService::encode_png(&m.to_raster())?),
            None => {
                warn!("No mask provided for shadow refinement; inpainting models may reject the request");
                None
            },
        };
        Ok(Self {
            image_png: ImageIOService::encode_png(raster)?,
            mask_png,
            scene,
            width: raster.width(),
            height: raster.height(),
        })
    }

    /// Dimensions of the encoded raster
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn prompt(&self) -> &'static str {
        self.scene.prompt()
    }

    #[must_use]
    pub fn negative_prompt(&self) -> &'static str {
        self.scene.negative_prompt()
    }
}

/// JSON body returned by the refinement endpoint
///
/// A successful call carries `output_url` or `output_base64` (raw base64 or a
/// `data:` URL); a failed one a `msg` and usually a non-200 `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl RefineResponse {
    /// Parse a response body; malformed JSON is reported as unavailable
    pub fn from_json_str(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| {
            ChromaShadeError::refinement_unavailable(format!("malformed response: {}", e))
        })
    }

    /// Where the refined image is, preferring the URL, or the reason there is none
    pub fn output(&self) -> Result<RefineOutput<'_>> {
        fn non_blank(field: &Option<String>) -> Option<&str> {
            field.as_deref().map(str::trim).filter(|v| !v.is_empty())
        }
        if let Some(url) = non_blank(&self.output_url) {
            return Ok(RefineOutput::Url(url));
        }
        if let Some(payload) = non_blank(&self.output_base64) {
            return decode_inline(payload).map(RefineOutput::Inline);
        }
        let reason = self
            .msg
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("Model returned empty output.");
        Err(ChromaShadeError::refinement_unavailable(reason))
    }
}

/// Refined image location carried by a [`RefineResponse`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefineOutput<'a> {
    /// Download through [`RefineBackend::fetch`]
    Url(&'a str),
    /// Encoded image bytes decoded from `output_base64`
    Inline(Vec<u8>),
}

/// Decode raw base64 or a `data:<mime>;base64,` URL
fn decode_inline(payload: &str) -> Result<Vec<u8>> {
    let data = match payload.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or("", |(_, data)| data),
        None => payload,
    };
    STANDARD.decode(data.trim()).map_err(|e| {
        ChromaShadeError::refinement_unavailable(format!("invalid base64 output: {}", e))
    })
}

/// Transport to the refinement service
///
/// Implementations own networking and authentication. Any error they return
/// is reported to the caller as [`RefinementUnavailable`](ChromaShadeError::RefinementUnavailable).
pub trait RefineBackend {
    /// Submit a request and return the parsed response body
    fn submit(&self, request: &RefineRequest) -> Result<RefineResponse>;

    /// Download the encoded image at `url`
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

fn unavailable(e: ChromaShadeError) -> ChromaShadeError {
    if e.is_refinement_unavailable() {
        e
    } else {
        ChromaShadeError::refinement_unavailable(e.to_string())
    }
}

/// Decode a refined image and fit it to `width x height`
///
/// Services sometimes return a different resolution; the result is resized so
/// it can replace the current raster directly.
pub fn apply_refinement(encoded: &[u8], width: u32, height: u32) -> Result<Raster> {
    let refined = ImageIOService::load_from_bytes(encoded).map_err(unavailable)?;
    if refined.dimensions() == (width, height) {
        return Ok(refined);
    }
    info!(
        from_width = refined.width(),
        from_height = refined.height(),
        width,
        height,
        "Resizing refined image to current dimensions"
    );
    let resized = imageops::resize(&refined.to_rgba_image()?, width, height, FilterType::Triangle);
    Raster::from_rgba_image(resized)
}

/// Run one refinement round trip through `backend`
///
/// # Errors
/// - [`InvalidDimensions`](ChromaShadeError::InvalidDimensions) when `mask` does not match `raster`
/// - [`RefinementUnavailable`](ChromaShadeError::RefinementUnavailable) for every backend,
///   response or decoding failure
#[instrument(skip_all, fields(width = raster.width(), height = raster.height(), scene = ?scene))]
pub fn refine_shadows<B: RefineBackend + ?Sized>(
    backend: &B,
    raster: &Raster,
    mask: Option<&BitMask>,
    scene: Scene,
) -> Result<Raster> {
    let request = RefineRequest::new(raster, mask, scene)?;
    let response = backend.submit(&request).map_err(unavailable)?;
    let bytes = match response.output()? {
        RefineOutput::Url(url) => backend.fetch(url).map_err(unavailable)?,
        RefineOutput::Inline(bytes) => bytes,
    };
    let (width, height) = request.dimensions();
    let refined = apply_refinement(&bytes, width, height)?;
    info!("Refinement applied");
    Ok(refined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct StubBackend {
        response: Result<RefineResponse>,
        image: Option<Raster>,
        seen: RefCell<Option<(Scene, bool)>>,
    }

    impl StubBackend {
        fn returning(image: Raster) -> Self {
            Self {
                response: Ok(RefineResponse {
                    output_url: Some("https://example.invalid/out.png".into()),
                    ..RefineResponse::default()
                }),
                image: Some(image),
                seen: RefCell::new(None),
            }
        }
    }

    impl RefineBackend for StubBackend {
        fn submit(&self, request: &RefineRequest) -> Result<RefineResponse> {
            *self.seen.borrow_mut() = Some((request.scene, request.mask_png.is_some()));
            match &self.response {
                Ok(r) => Ok(r.clone()),
                Err(e) => Err(ChromaShadeError::processing(e.to_string())),
            }
        }

        fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            match &self.image {
                Some(img) => ImageIOService::encode_png(img),
                None => Ok(b"not an image".to_vec()),
            }
        }
    }

    #[test]
    fn test_scene_prompts_differ() {
        assert!(Scene::Portrait.prompt().contains("face"));
        assert!(Scene::Building.negative_prompt().contains("distorted structure"));
        assert_eq!("Object".parse::<Scene>().unwrap(), Scene::Object);
        assert!("sky".parse::<Scene>().is_err());
    }

    #[test]
    fn test_response_without_url_is_unavailable() {
        let response = RefineResponse::from_json_str(r#"{"msg":"Model returned empty output.","status":500}"#)
            .unwrap();
        let err = response.output().unwrap_err();
        assert!(err.is_refinement_unavailable());
        assert!(err.to_string().contains("empty output"));

        let blank = RefineResponse::from_json_str(r#"{"output_url":"  ","output_base64":""}"#).unwrap();
        assert!(blank.output().is_err());
        assert!(RefineResponse::from_json_str("<html>").unwrap_err().is_refinement_unavailable());
    }

    #[test]
    fn test_url_takes_precedence_over_inline_output() {
        let response = RefineResponse::from_json_str(
            r#"{"output_url":"https://example.invalid/a.png","output_base64":"aGk="}"#,
        )
        .unwrap();
        assert_eq!(response.output().unwrap(), RefineOutput::Url("https://example.invalid/a.png"));

        let inline = RefineResponse::from_json_str(r#"{"output_base64":"aGVsbG8="}"#).unwrap();
        assert_eq!(inline.output().unwrap(), RefineOutput::Inline(b"hello".to_vec()));

        let bad =
            RefineResponse::from_json_str(r#"{"output_base64":"data:image/png;base64,@@@"}"#).unwrap();
        assert!(bad.output().unwrap_err().is_refinement_unavailable());
    }

    #[test]
    fn test_inline_data_url_is_applied_without_fetch() {
        let current = Raster::filled(8, 6, [0, 0, 0, 255]).unwrap();
        let refined_raster = Raster::filled(8, 6, [180, 170, 160, 255]).unwrap();
        let png = ImageIOService::encode_png(&refined_raster).unwrap();
        let backend = StubBackend {
            response: Ok(RefineResponse {
                output_base64: Some(format!("data:image/png;base64,{}", STANDARD.encode(&png))),
                ..RefineResponse::default()
            }),
            // fetch would hand back garbage
            image: None,
            seen: RefCell::new(None),
        };
        let refined = refine_shadows(&backend, &current, None, Scene::Object).unwrap();
        assert_eq!(refined.pixel(3, 3), [180, 170, 160, 255]);

        let raw = StubBackend {
            response: Ok(RefineResponse {
                output_base64: Some(STANDARD.encode(&png)),
                ..RefineResponse::default()
            }),
            image: None,
            seen: RefCell::new(None),
        };
        let refined = refine_shadows(&raw, &current, None, Scene::Object).unwrap();
        assert_eq!(refined.pixel(0, 0), [180, 170, 160, 255]);
    }

    #[test]
    fn test_request_rejects_mismatched_mask() {
        let raster = Raster::filled(4, 4, [0, 0, 0, 255]).unwrap();
        let err = RefineRequest::new(&raster, Some(&BitMask::new(2, 2)), Scene::General).unwrap_err();
        assert!(matches!(err, ChromaShadeError::InvalidDimensions(_)));
    }

    #[test]
    fn test_mask_is_encoded_black_and_white() {
        let raster = Raster::filled(4, 4, [9, 9, 9, 255]).unwrap();
        let mask = BitMask::from_fn(4, 4, |x, _| x == 0);
        let request = RefineRequest::new(&raster, Some(&mask), Scene::Object).unwrap();
        let decoded = ImageIOService::load_from_bytes(request.mask_png.as_deref().unwrap()).unwrap();
        assert_eq!(decoded.pixel(0, 2), [255, 255, 255, 255]);
        assert_eq!(decoded.pixel(3, 2), [0, 0, 0, 255]);
    }

    #[test]
    fn test_refined_image_is_resized() {
        let current = Raster::filled(8, 6, [0, 0, 0, 255]).unwrap();
        let backend = StubBackend::returning(Raster::filled(16, 12, [200, 200, 200, 255]).unwrap());
        let refined = refine_shadows(&backend, &current, None, Scene::Portrait).unwrap();
        assert_eq!(refined.dimensions(), (8, 6));
        assert_eq!(refined.pixel(4, 3), [200, 200, 200, 255]);
        assert_eq!(*backend.seen.borrow(), Some((Scene::Portrait, false)));
    }

    #[test]
    fn test_failures_map_to_unavailable() {
        let current = Raster::filled(4, 4, [1, 2, 3, 255]).unwrap();
        let snapshot = current.clone();

        let garbage = StubBackend {
            image: None,
            ..StubBackend::returning(current.clone())
        };
        let err = refine_shadows(&garbage, &current, None, Scene::General).unwrap_err();
        assert!(err.is_refinement_unavailable());

        let failing = StubBackend {
            response: Err(ChromaShadeError::processing("connection reset")),
            ..StubBackend::returning(current.clone())
        };
        let err = refine_shadows(&failing, &current, None, Scene::General).unwrap_err();
        assert!(err.is_refinement_unavailable());
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(current, snapshot);
    }
}
