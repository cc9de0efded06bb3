//! XMLTV document writer
//!
//! Serializes a [`MergedDocument`] as indented UTF-8 XMLTV. Channels carry
//! only `id` and `icon`; programme children follow DTD order.

use crate::error::WriteError;
use crate::models::{MergedDocument, OutputChannel, OutputProgramme};
use crate::normalize::format_timestamp;
use quick_xml::escape::escape;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Attributes of the `<tv>` root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    pub generator_name: String,
    pub generator_url: Option<String>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            generator_name: format!("xmltv-merger {}", env!("CARGO_PKG_VERSION")),
            generator_url: Some(env!("CARGO_PKG_REPOSITORY").to_string()),
        }
    }
}

/// Serialize `doc` into `out`
pub fn write_document<W: Write>(
    doc: &MergedDocument,
    mut out: W,
    options: &WriterOptions,
) -> Result<(), WriteError> {
    let mut header = String::new();
    header.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    header.push_str("<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n");
    header.push_str(&format!(
        "<tv generator-info-name=\"{}\"",
        escape(&options.generator_name)
    ));
    if let Some(url) = &options.generator_url {
        header.push_str(&format!(" generator-info-url=\"{}\"", escape(url)));
    }
    header.push_str(">\n");
    out.write_all(header.as_bytes())?;

    for channel in &doc.channels {
        out.write_all(render_channel(channel).as_bytes())?;
    }
    for programme in &doc.programmes {
        out.write_all(render_programme(programme).as_bytes())?;
    }

    out.write_all(b"</tv>\n")?;
    out.flush()?;
    Ok(())
}

/// Serialize `doc` to a string
pub fn render_document(doc: &MergedDocument, options: &WriterOptions) -> Result<String, WriteError> {
    let mut buf = Vec::new();
    write_document(doc, &mut buf, options)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write `doc` to `path` through a sibling `.part` file renamed into place
pub fn write_to_path(
    doc: &MergedDocument,
    path: &Path,
    options: &WriterOptions,
) -> Result<(), WriteError> {
    let part = part_path(path);
    let file = File::create(&part).map_err(|source| WriteError::Io {
        path: part.clone(),
        source,
    })?;

    let result = write_document(doc, BufWriter::new(file), options)
        .map_err(|e| match e {
            WriteError::Stream(source) => WriteError::Io {
                path: part.clone(),
                source,
            },
            other => other,
        })
        .and_then(|_| {
            fs::rename(&part, path).map_err(|source| WriteError::Io {
                path: path.to_path_buf(),
                source,
            })
        });

    if result.is_err() {
        let _ = fs::remove_file(&part);
        return result;
    }

    info!(
        "Successfully created {}: {} channels, {} programmes",
        path.display(),
        doc.channels.len(),
        doc.programme_count()
    );
    Ok(())
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

fn render_channel(channel: &OutputChannel) -> String {
    match &channel.icon {
        Some(icon) => format!(
            "  <channel id=\"{}\">\n    <icon src=\"{}\" />\n  </channel>\n",
            escape(&channel.id),
            escape(icon)
        ),
        None => format!("  <channel id=\"{}\" />\n", escape(&channel.id)),
    }
}

fn lang_attr(lang: &Option<String>) -> String {
    lang.as_ref()
        .map(|l| format!(" lang=\"{}\"", escape(l)))
        .unwrap_or_default()
}

fn system_attr(system: &Option<String>) -> String {
    system
        .as_ref()
        .map(|s| format!(" system=\"{}\"", escape(s)))
        .unwrap_or_default()
}

fn render_programme(programme: &OutputProgramme) -> String {
    let mut xml = String::new();

    xml.push_str(&format!("  <programme start=\"{}\"", format_timestamp(&programme.start)));
    if let Some(stop) = &programme.stop {
        xml.push_str(&format!(" stop=\"{}\"", format_timestamp(stop)));
    }
    xml.push_str(&format!(" channel=\"{}\">\n", escape(&programme.channel_id)));

    xml.push_str(&format!(
        "    <title{}>{}</title>\n",
        lang_attr(&programme.title.lang),
        escape(&programme.title.text)
    ));
    if let Some(sub_title) = &programme.sub_title {
        xml.push_str(&format!(
            "    <sub-title{}>{}</sub-title>\n",
            lang_attr(&sub_title.lang),
            escape(&sub_title.text)
        ));
    }
    if let Some(desc) = &programme.description {
        xml.push_str(&format!(
            "    <desc{}>{}</desc>\n",
            lang_attr(&desc.lang),
            escape(&desc.text)
        ));
    }

    if !programme.credits.is_empty() {
        xml.push_str("    <credits>\n");
        for credit in &programme.credits {
            let tag = credit.role.tag();
            let role = credit
                .character
                .as_ref()
                .map(|c| format!(" role=\"{}\"", escape(c)))
                .unwrap_or_default();
            xml.push_str(&format!(
                "      <{}{}>{}</{}>\n",
                tag,
                role,
                escape(&credit.name),
                tag
            ));
        }
        xml.push_str("    </credits>\n");
    }

    if let Some(date) = &programme.date {
        xml.push_str(&format!("    <date>{}</date>\n", escape(date)));
    }
    for genre in &programme.genres {
        xml.push_str(&format!(
            "    <category{}>{}</category>\n",
            lang_attr(&genre.lang),
            escape(&genre.text)
        ));
    }
    if let Some(episode) = &programme.episode_num {
        xml.push_str(&format!(
            "    <episode-num{}>{}</episode-num>\n",
            system_attr(&episode.system),
            escape(&episode.value)
        ));
    }
    for rating in &programme.ratings {
        xml.push_str(&format!(
            "    <rating{}>\n      <value>{}</value>\n    </rating>\n",
            system_attr(&rating.system),
            escape(&rating.value)
        ));
    }

    xml.push_str("  </programme>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credit, CreditRole, EpisodeNum, LangText, Rating};
    use crate::normalize::parse_timestamp;

    fn sample_document() -> MergedDocument {
        let mut actor = Credit::new(CreditRole::Actor, "Ana Belén");
        actor.character = Some("Lola".to_string());
        MergedDocument {
            channels: vec![
                OutputChannel {
                    id: "a&b.es".to_string(),
                    icon: Some("http://logo/a.png?x=1&y=2".to_string()),
                },
                OutputChannel {
                    id: "plain.es".to_string(),
                    icon: None,
                },
            ],
            programmes: vec![OutputProgramme {
                channel_id: "a&b.es".to_string(),
                start: parse_timestamp("20240115120000 +0100").unwrap(),
                stop: parse_timestamp("20240115133000 +0100"),
                title: LangText::with_lang("Tom & Jerry <HD>", Some("es")),
                sub_title: None,
                description: Some(LangText::new("Line one.\nLine \"two\".")),
                credits: vec![Credit::new(CreditRole::Director, "Pedro"), actor],
                date: Some("1998".to_string()),
                genres: vec![LangText::with_lang("Comedy", Some("en"))],
                episode_num: Some(EpisodeNum {
                    value: "0.4.".to_string(),
                    system: Some("xmltv_ns".to_string()),
                }),
                ratings: vec![Rating {
                    system: Some("ES".to_string()),
                    value: "+7".to_string(),
                }],
            }],
        }
    }

    #[test]
    fn test_render_document() {
        let options = WriterOptions {
            generator_name: "test".to_string(),
            generator_url: Some("http://example.com".to_string()),
        };
        let xml = render_document(&sample_document(), &options).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(xml.contains(
            "<tv generator-info-name=\"test\" generator-info-url=\"http://example.com\">"
        ));
        assert!(xml.contains("<channel id=\"a&amp;b.es\">"));
        assert!(xml.contains("<icon src=\"http://logo/a.png?x=1&amp;y=2\" />"));
        assert!(xml.contains("<channel id=\"plain.es\" />"));
        assert!(!xml.contains("display-name"));
        assert!(xml.contains(
            "<programme start=\"20240115120000 +0100\" stop=\"20240115133000 +0100\" channel=\"a&amp;b.es\">"
        ));
        assert!(xml.contains("<title lang=\"es\">Tom &amp; Jerry &lt;HD&gt;</title>"));
        assert!(xml.contains("<actor role=\"Lola\">Ana Belén</actor>"));
        assert!(xml.contains("<episode-num system=\"xmltv_ns\">0.4.</episode-num>"));
        assert!(xml.trim_end().ends_with("</tv>"));
    }

    #[test]
    fn test_child_order_follows_dtd() {
        let xml = render_document(&sample_document(), &WriterOptions::default()).unwrap();
        let order = [
            "<title", "<desc", "<credits>", "<director>", "<actor", "<date>", "<category",
            "<episode-num", "<rating",
        ];
        let positions: Vec<usize> = order.iter().map(|tag| xml.find(tag).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", positions);
    }

    #[test]
    fn test_default_root_carries_generator_url() {
        let xml = render_document(&sample_document(), &WriterOptions::default()).unwrap();
        assert!(xml.contains(&format!(
            "<tv generator-info-name=\"xmltv-merger {}\" generator-info-url=\"https://github.com/alvarocandela/epg-grab\">",
            env!("CARGO_PKG_VERSION")
        )));
    }

    #[test]
    fn test_no_stop_attribute_when_absent() {
        let mut doc = sample_document();
        doc.programmes[0].stop = None;
        let xml = render_document(&doc, &WriterOptions::default()).unwrap();
        assert!(!xml.contains("stop="));
    }

    #[test]
    fn test_write_to_path_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined.xml");
        std::fs::write(&path, "old").unwrap();

        write_to_path(&sample_document(), &path, &WriterOptions::default()).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("<tv generator-info-name=\"xmltv-merger"));
        assert!(!dir.path().join("combined.xml.part").exists());
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("combined.xml");
        let err = write_to_path(&sample_document(), &path, &WriterOptions::default()).unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));
        assert!(!path.exists());
    }
}
