use std::time::Duration;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::{Client, Response, multipart};
use scene::Hotspot;
use tracing::debug;

use crate::StoreError;
use crate::backend::{HotspotBackend, HotspotSnapshot, validate_list, validate_snapshot};
use crate::wire::{ImageBody, ImagesBody, RemovedImage, UploadedFile};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the hotspot REST API (`/api` prefix included in `base_url`).
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    base: Url,
    http: Client,
}

impl RemoteBackend {
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let base = Url::parse(base_url).map_err(|e| StoreError::Http(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Http(format!("not a base url: {base_url}")));
        }
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Http(e.to_string()))?;
        Ok(Self { base, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `new` rejects cannot-be-a-base urls, so segments are always available.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Uploads an image; the returned `path` can be added to a hotspot's images.
    pub fn upload(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, StoreError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)
            .map_err(|e| StoreError::Http(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);
        let resp = self
            .http
            .post(self.url(&["upload"]))
            .multipart(form)
            .send()
            .map_err(transport)?;
        json(expect_success(resp)?)
    }

    pub fn delete_upload(&self, filename: &str) -> Result<(), StoreError> {
        let resp = self
            .http
            .delete(self.url(&["upload", filename]))
            .send()
            .map_err(transport)?;
        expect_success(resp).map(drop)
    }

    fn hotspot_call(
        &self,
        viewpoint: &str,
        hotspot_id: &str,
        resp: Result<Response, reqwest::Error>,
    ) -> Result<Response, StoreError> {
        let resp = resp.map_err(transport)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::HotspotNotFound {
                viewpoint: viewpoint.to_string(),
                hotspot: hotspot_id.to_string(),
            });
        }
        expect_success(resp)
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Http(err.to_string())
}

fn expect_success(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(StoreError::Http(format!("{status}: {body}")))
}

fn json<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, StoreError> {
    resp.json::<T>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

impl HotspotBackend for RemoteBackend {
    fn load_all(&self) -> Result<HotspotSnapshot, StoreError> {
        let resp = self
            .http
            .get(self.url(&["hotspots"]))
            .send()
            .map_err(transport)?;
        let snapshot: HotspotSnapshot = json(expect_success(resp)?)?;
        validate_snapshot(&snapshot)?;
        Ok(snapshot)
    }

    fn load(&self, viewpoint: &str) -> Result<Vec<Hotspot>, StoreError> {
        let resp = self
            .http
            .get(self.url(&["hotspots", viewpoint]))
            .send()
            .map_err(transport)?;
        let list: Vec<Hotspot> = json(expect_success(resp)?)?;
        validate_list(viewpoint, &list)?;
        Ok(list)
    }

    fn save(&mut self, viewpoint: &str, hotspots: &[Hotspot]) -> Result<(), StoreError> {
        debug!(viewpoint, count = hotspots.len(), "PUT hotspots");
        let resp = self
            .http
            .put(self.url(&["hotspots", viewpoint]))
            .json(hotspots)
            .send()
            .map_err(transport)?;
        expect_success(resp).map(drop)
    }

    fn save_all(&mut self, snapshot: &HotspotSnapshot) -> Result<(), StoreError> {
        // The API has no bulk replace; drop viewpoints the snapshot no longer has.
        let existing = self.load_all()?;
        for viewpoint in existing.keys().filter(|k| !snapshot.contains_key(*k)) {
            self.save(viewpoint, &[])?;
        }
        for (viewpoint, list) in snapshot {
            self.save(viewpoint, list)?;
        }
        Ok(())
    }

    fn update_hotspot(&mut self, viewpoint: &str, hotspot: &Hotspot) -> Result<(), StoreError> {
        let resp = self
            .http
            .put(self.url(&["hotspots", viewpoint, &hotspot.id]))
            .json(hotspot)
            .send();
        self.hotspot_call(viewpoint, &hotspot.id, resp).map(drop)
    }

    fn set_images(
        &mut self,
        viewpoint: &str,
        hotspot_id: &str,
        images: &[String],
    ) -> Result<(), StoreError> {
        let resp = self
            .http
            .put(self.url(&["hotspots", viewpoint, hotspot_id, "images"]))
            .json(&ImagesBody {
                images: images.to_vec(),
            })
            .send();
        self.hotspot_call(viewpoint, hotspot_id, resp).map(drop)
    }

    fn add_image(&mut self, viewpoint: &str, hotspot_id: &str, image: &str) -> Result<(), StoreError> {
        if image.trim().is_empty() {
            return Err(StoreError::EmptyImage);
        }
        let resp = self
            .http
            .post(self.url(&["hotspots", viewpoint, hotspot_id, "images"]))
            .json(&ImageBody {
                image: image.to_string(),
            })
            .send();
        self.hotspot_call(viewpoint, hotspot_id, resp).map(drop)
    }

    fn remove_image(
        &mut self,
        viewpoint: &str,
        hotspot_id: &str,
        index: usize,
    ) -> Result<String, StoreError> {
        let index_segment = index.to_string();
        let resp = self
            .http
            .delete(self.url(&["hotspots", viewpoint, hotspot_id, "images", &index_segment]))
            .send();
        let body: RemovedImage = json(self.hotspot_call(viewpoint, hotspot_id, resp)?)?;
        Ok(body.removed)
    }

    /// Resets to the server's own defaults; `defaults` is not sent.
    fn reset(&mut self, _defaults: &HotspotSnapshot) -> Result<HotspotSnapshot, StoreError> {
        let resp = self
            .http
            .post(self.url(&["hotspots", "reset"]))
            .send()
            .map_err(transport)?;
        expect_success(resp)?;
        self.load_all()
    }
}
