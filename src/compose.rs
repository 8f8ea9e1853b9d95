//! PDF authoring on top of `lopdf`.
//!
//! [`PdfComposer`] builds a fresh document from pages copied out of loaded
//! sources ([`SourcePdf`]) and from raster images. It is the only place in
//! the crate that writes PDF structure; the reorderer and the combiner are
//! thin orderings over it.
//!
//! ## Copying pages
//!
//! A source is imported by renumbering every one of its objects past the
//! destination's highest id and rewriting references to match. Page
//! dictionaries are then re-parented under the new page tree. Attributes a
//! page inherits from its old tree (`MediaBox`, `CropBox`, `Resources`,
//! `Rotate`) are copied onto the page itself first, since the old tree is
//! not carried over. Anything left unreferenced is pruned before saving.
//!
//! Streams are never recompressed, so copied content is byte-for-byte
//! identical to the source.
//!
//! ## Image pages
//!
//! JPEG data is embedded as-is (`DCTDecode`). PNG data is decoded and stored
//! as zlib-compressed RGB (`FlateDecode`), with a soft mask when the image
//! has an alpha channel. Either way the page is exactly the image's pixel
//! size, with the image drawn at the origin.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, GenericImageView, ImageFormat};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::{Cursor, Write};
use thiserror::Error;
use tracing::{debug, info};

/// US Letter, used when a source page has no `MediaBox` anywhere in its tree.
const DEFAULT_MEDIA_BOX: [i64; 4] = [0, 0, 612, 792];

/// Page attributes a page may inherit from its ancestors.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Failures while reading sources or building the output document.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("could not parse '{name}': {detail}")]
    Parse { name: String, detail: String },

    #[error("'{name}' is encrypted")]
    Encrypted { name: String },

    #[error("page {page} does not exist in '{name}' ({total} pages)")]
    MissingPage {
        name: String,
        page: usize,
        total: usize,
    },

    #[error("could not embed image '{name}': {detail}")]
    Image { name: String, detail: String },

    #[error("document has no pages")]
    Empty,

    #[error("could not serialise PDF: {0}")]
    Save(String),
}

/// Raster encodings that can become a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    Png,
    Jpeg,
}

impl ImageEncoding {
    /// Encoding for a MIME type, or `None` if it cannot be embedded.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        match mime_type {
            "image/png" => Some(ImageEncoding::Png),
            "image/jpeg" | "image/jpg" => Some(ImageEncoding::Jpeg),
            _ => None,
        }
    }
}

/// A parsed PDF whose pages can be copied.
#[derive(Debug, Clone)]
pub struct SourcePdf {
    name: String,
    doc: Document,
    /// Page object ids in document order.
    pages: Vec<ObjectId>,
}

impl SourcePdf {
    pub fn load(name: &str, bytes: &[u8]) -> Result<Self, ComposeError> {
        let doc = Document::load_mem(bytes).map_err(|e| ComposeError::Parse {
            name: name.to_string(),
            detail: e.to_string(),
        })?;
        if doc.is_encrypted() {
            return Err(ComposeError::Encrypted {
                name: name.to_string(),
            });
        }
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        debug!("Parsed '{}': {} pages", name, pages.len());
        Ok(Self {
            name: name.to_string(),
            doc,
            pages,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Look up `key` on the page or its nearest ancestor.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut node = self.doc.get_dictionary(page_id).ok()?;
        // Bounded walk; malformed trees can contain cycles.
        for _ in 0..64 {
            if let Ok(value) = node.get(key) {
                return Some(value.clone());
            }
            let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
            node = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }
}

/// Builds a new PDF page by page.
#[derive(Debug)]
pub struct PdfComposer {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl Default for PdfComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfComposer {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append every page of `source` in its own order.
    pub fn append_all(&mut self, source: &SourcePdf) -> Result<(), ComposeError> {
        let all: Vec<usize> = (0..source.page_count()).collect();
        self.copy_pages(source, &all)
    }

    /// Append the given 0-based pages of `source`, in the order listed.
    pub fn copy_pages(&mut self, source: &SourcePdf, indices: &[usize]) -> Result<(), ComposeError> {
        let total = source.page_count();
        if let Some(&bad) = indices.iter().find(|&&i| i >= total) {
            return Err(ComposeError::MissingPage {
                name: source.name.clone(),
                page: bad + 1,
                total,
            });
        }

        let offset = self.doc.max_id;
        for (id, object) in source.doc.objects.iter() {
            self.doc
                .objects
                .insert((id.0 + offset, id.1), remap_refs(object.clone(), offset));
        }
        self.doc.max_id = self.doc.max_id.max(source.doc.max_id + offset);

        for &index in indices {
            let src_id = source.pages[index];
            let new_id = (src_id.0 + offset, src_id.1);

            let mut inherited: Vec<(&[u8], Object)> = Vec::new();
            for key in INHERITABLE {
                if let Some(value) = source.inherited(src_id, key) {
                    inherited.push((key, remap_refs(value, offset)));
                }
            }

            let page = self
                .doc
                .objects
                .get_mut(&new_id)
                .and_then(|o| o.as_dict_mut().ok())
                .ok_or_else(|| ComposeError::Parse {
                    name: source.name.clone(),
                    detail: format!("page {} is not a dictionary", index + 1),
                })?;
            for (key, value) in inherited {
                page.set(key.to_vec(), value);
            }
            if !page.has(b"MediaBox") {
                page.set("MediaBox", media_box(DEFAULT_MEDIA_BOX));
            }
            page.set("Parent", Object::Reference(self.pages_id));
            self.kids.push(new_id);
        }

        debug!(
            "Copied {} page(s) from '{}' (id offset {})",
            indices.len(),
            source.name,
            offset
        );
        Ok(())
    }

    /// Append one page sized to the image, drawing the image at the origin.
    ///
    /// Returns the page size in points (equal to the pixel size).
    pub fn add_image_page(
        &mut self,
        name: &str,
        bytes: &[u8],
        encoding: ImageEncoding,
    ) -> Result<(u32, u32), ComposeError> {
        let image_err = |detail: String| ComposeError::Image {
            name: name.to_string(),
            detail,
        };

        let (xobject, width, height) = match encoding {
            ImageEncoding::Jpeg => jpeg_xobject(bytes).map_err(image_err)?,
            ImageEncoding::Png => {
                let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)
                    .map_err(|e| image_err(e.to_string()))?;
                self.png_xobject(&decoded).map_err(image_err)?
            }
        };
        let image_id = self.doc.add_object(xobject);

        let content = format!("q {width} 0 0 {height} 0 0 cm /Im0 Do Q");
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", Object::Reference(image_id));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));

        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(self.pages_id)),
            (
                "MediaBox",
                media_box([0, 0, i64::from(width), i64::from(height)]),
            ),
            ("Resources", Object::Dictionary(resources)),
            ("Contents", Object::Reference(content_id)),
        ]);
        let page_id = self.doc.add_object(page);
        self.kids.push(page_id);

        debug!("Embedded '{}' as a {}x{} page", name, width, height);
        Ok((width, height))
    }

    fn png_xobject(&mut self, decoded: &DynamicImage) -> Result<(Stream, u32, u32), String> {
        let (width, height) = decoded.dimensions();
        let mut dict = image_dict(width, height, "DeviceRGB");
        dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));

        let rgb = decoded.to_rgb8();
        if decoded.color().has_alpha() {
            let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|p| p.0[3]).collect();
            let mut mask = image_dict(width, height, "DeviceGray");
            mask.set("Filter", Object::Name(b"FlateDecode".to_vec()));
            let mask_id = self.doc.add_object(Stream::new(mask, deflate(&alpha)?));
            dict.set("SMask", Object::Reference(mask_id));
        }

        Ok((Stream::new(dict, deflate(rgb.as_raw())?), width, height))
    }

    /// Serialise the document.
    pub fn finish(mut self) -> Result<Vec<u8>, ComposeError> {
        if self.kids.is_empty() {
            return Err(ComposeError::Empty);
        }

        let count = self.kids.len();
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(count as i64)),
            (
                "Kids",
                Object::Array(self.kids.iter().map(|&id| Object::Reference(id)).collect()),
            ),
        ]);
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]);
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        let pruned = self.doc.prune_objects();
        debug!("Pruned {} unreferenced object(s)", pruned.len());

        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| ComposeError::Save(e.to_string()))?;
        info!("Composed PDF: {} pages, {} bytes", count, buffer.len());
        Ok(buffer)
    }
}

fn media_box(rect: [i64; 4]) -> Object {
    Object::Array(rect.iter().map(|&v| Object::Integer(v)).collect())
}

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    Dictionary::from_iter(vec![
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(i64::from(width))),
        ("Height", Object::Integer(i64::from(height))),
        ("ColorSpace", Object::Name(color_space.as_bytes().to_vec())),
        ("BitsPerComponent", Object::Integer(8)),
    ])
}

fn jpeg_xobject(bytes: &[u8]) -> Result<(Stream, u32, u32), String> {
    let (width, height) = image::ImageReader::with_format(Cursor::new(bytes), ImageFormat::Jpeg)
        .into_dimensions()
        .map_err(|e| e.to_string())?;
    let components = jpeg_components(bytes).ok_or("no frame header found")?;

    let color_space = match components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => return Err(format!("unsupported component count {n}")),
    };
    let mut dict = image_dict(width, height, color_space);
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
    if components == 4 {
        // Adobe CMYK JPEGs store inverted samples.
        dict.set(
            "Decode",
            Object::Array([1, 0, 1, 0, 1, 0, 1, 0].into_iter().map(Object::Integer).collect()),
        );
    }

    let mut stream = Stream::new(dict, bytes.to_vec());
    stream.allows_compression = false;
    Ok((stream, width, height))
}

/// Component count from the first SOFn marker.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    let mut i = 2;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = bytes[i + 1];
        let len = usize::from(u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]));
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            return bytes.get(i + 9).copied();
        }
        i += 2 + len;
    }
    None
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(|e| e.to_string())?;
    encoder.finish().map_err(|e| e.to_string())
}

/// Rewrite every reference inside `obj` by `offset`.
fn remap_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(arr.into_iter().map(|o| remap_refs(o, offset)).collect()),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}
