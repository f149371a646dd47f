//! Media service: profiles, stream and snapshot URIs.

use super::{required_argument, HandlerContext, ServiceHandler};
use crate::config::MediaProfile;
use crate::error::HandlerError;
use crate::response::xml_escape;
use crate::store::{MEDIA_NS, SCHEMA_NS};
use std::fmt::Write as _;

/// Handles GetProfiles, GetStreamUri, GetSnapshotUri and
/// GetVideoEncoderConfiguration.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaService;

impl MediaService {
    pub const OPERATIONS: [&'static str; 4] = [
        "GetProfiles",
        "GetStreamUri",
        "GetSnapshotUri",
        "GetVideoEncoderConfiguration",
    ];

    fn profiles(&self, ctx: &HandlerContext<'_>) -> String {
        let mut xml = format!(
            r#"<trt:GetProfilesResponse xmlns:trt="{trt}" xmlns:tt="{tt}">"#,
            trt = MEDIA_NS,
            tt = SCHEMA_NS,
        );

        for profile in ctx.store.profiles() {
            let _ = write!(
                xml,
                r#"<trt:Profiles token="{}" fixed="{}"><tt:Name>{}</tt:Name><tt:VideoEncoderConfiguration><tt:Encoding>{}</tt:Encoding><tt:Resolution><tt:Width>{}</tt:Width><tt:Height>{}</tt:Height></tt:Resolution><tt:Quality>{}</tt:Quality><tt:RateControl><tt:FrameRateLimit>{}</tt:FrameRateLimit><tt:BitrateLimit>{}</tt:BitrateLimit></tt:RateControl></tt:VideoEncoderConfiguration></trt:Profiles>"#,
                xml_escape(&profile.token),
                profile.fixed,
                xml_escape(&profile.name),
                xml_escape(&profile.encoding),
                profile.width,
                profile.height,
                profile.quality,
                profile.frame_rate_limit,
                profile.bitrate_limit,
            );
        }

        xml.push_str("</trt:GetProfilesResponse>");
        xml
    }

    fn lookup_profile(
        &self,
        body: &str,
        ctx: &HandlerContext<'_>,
    ) -> Result<MediaProfile, HandlerError> {
        let token = required_argument(body, "ProfileToken")?;
        ctx.store
            .find_profile(&token)
            .ok_or_else(|| HandlerError::InvalidArgument(format!("no profile '{}'", token)))
    }

    fn media_uri(&self, response: &str, uri: &str, timeout: &str) -> String {
        format!(
            r#"<trt:{response} xmlns:trt="{trt}" xmlns:tt="{tt}"><trt:MediaUri><tt:Uri>{uri}</tt:Uri><tt:InvalidAfterConnect>false</tt:InvalidAfterConnect><tt:InvalidAfterReboot>false</tt:InvalidAfterReboot><tt:Timeout>{timeout}</tt:Timeout></trt:MediaUri></trt:{response}>"#,
            response = response,
            trt = MEDIA_NS,
            tt = SCHEMA_NS,
            uri = xml_escape(uri),
            timeout = timeout,
        )
    }

    fn video_encoder_configuration(
        &self,
        body: &str,
        ctx: &HandlerContext<'_>,
    ) -> Result<String, HandlerError> {
        let token = required_argument(body, "ConfigurationToken")?;

        // One encoder configuration, shared with the first profile.
        let profile = ctx
            .store
            .profiles()
            .into_iter()
            .next()
            .ok_or_else(|| HandlerError::NotSupported("no media profiles configured".to_string()))?;

        Ok(format!(
            r#"<trt:GetVideoEncoderConfigurationResponse xmlns:trt="{trt}" xmlns:tt="{tt}"><trt:Configuration token="{}"><tt:Name>VideoEncoderConfig</tt:Name><tt:UseCount>1</tt:UseCount><tt:Encoding>{}</tt:Encoding><tt:Resolution><tt:Width>{}</tt:Width><tt:Height>{}</tt:Height></tt:Resolution><tt:Quality>{}</tt:Quality><tt:RateControl><tt:FrameRateLimit>{}</tt:FrameRateLimit><tt:EncodingInterval>1</tt:EncodingInterval><tt:BitrateLimit>{}</tt:BitrateLimit></tt:RateControl></trt:Configuration></trt:GetVideoEncoderConfigurationResponse>"#,
            xml_escape(&token),
            xml_escape(&profile.encoding),
            profile.width,
            profile.height,
            profile.quality,
            profile.frame_rate_limit,
            profile.bitrate_limit,
            trt = MEDIA_NS,
            tt = SCHEMA_NS,
        ))
    }
}

impl ServiceHandler for MediaService {
    fn handle(
        &self,
        operation: &str,
        body: &str,
        ctx: &HandlerContext<'_>,
    ) -> Result<String, HandlerError> {
        match operation {
            "GetProfiles" => Ok(self.profiles(ctx)),
            "GetStreamUri" => {
                let profile = self.lookup_profile(body, ctx)?;
                Ok(self.media_uri("GetStreamUriResponse", &profile.rtsp_uri, "PT60S"))
            }
            "GetSnapshotUri" => {
                let profile = self.lookup_profile(body, ctx)?;
                Ok(self.media_uri("GetSnapshotUriResponse", &profile.snapshot_uri, "PT0S"))
            }
            "GetVideoEncoderConfiguration" => self.video_encoder_configuration(body, ctx),
            other => Err(HandlerError::NotSupported(format!(
                "media service does not implement {}",
                other
            ))),
        }
    }
}
