//! Device management service.

use super::{HandlerContext, ServiceHandler};
use crate::error::HandlerError;
use crate::response::xml_escape;
use crate::store::{ServiceEndpoint, DEVICE_NS, SCHEMA_NS};
use chrono::{Datelike, Timelike};
use std::fmt::Write as _;

/// Handles GetDeviceInformation, GetCapabilities, GetServices and
/// GetSystemDateAndTime.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceService;

impl DeviceService {
    pub const OPERATIONS: [&'static str; 4] = [
        "GetDeviceInformation",
        "GetCapabilities",
        "GetServices",
        "GetSystemDateAndTime",
    ];

    fn device_information(&self, ctx: &HandlerContext<'_>) -> String {
        let info = ctx.store.device_info();
        let hardware_id = if info.hardware_id.is_empty() {
            "N/A"
        } else {
            info.hardware_id.as_str()
        };

        format!(
            r#"<tds:GetDeviceInformationResponse xmlns:tds="{ns}"><tds:Manufacturer>{}</tds:Manufacturer><tds:Model>{}</tds:Model><tds:FirmwareVersion>{}</tds:FirmwareVersion><tds:SerialNumber>{}</tds:SerialNumber><tds:HardwareId>{}</tds:HardwareId></tds:GetDeviceInformationResponse>"#,
            xml_escape(&info.manufacturer),
            xml_escape(&info.model),
            xml_escape(&info.firmware_version),
            xml_escape(&info.serial_number),
            xml_escape(hardware_id),
            ns = DEVICE_NS,
        )
    }

    fn capabilities(&self, ctx: &HandlerContext<'_>) -> String {
        let services = ctx.store.services();
        let mut xml = format!(
            r#"<tds:GetCapabilitiesResponse xmlns:tds="{tds}" xmlns:tt="{tt}"><tds:Capabilities>"#,
            tds = DEVICE_NS,
            tt = SCHEMA_NS,
        );

        let _ = write!(
            xml,
            "<tt:Device><tt:XAddr>{}</tt:XAddr>\
             <tt:Network><tt:IPFilter>false</tt:IPFilter><tt:ZeroConfiguration>false</tt:ZeroConfiguration>\
             <tt:IPVersion6>false</tt:IPVersion6><tt:DynDNS>false</tt:DynDNS></tt:Network>\
             <tt:System><tt:DiscoveryResolve>false</tt:DiscoveryResolve><tt:DiscoveryBye>false</tt:DiscoveryBye>\
             <tt:RemoteDiscovery>false</tt:RemoteDiscovery><tt:SystemBackup>false</tt:SystemBackup>\
             <tt:SystemLogging>false</tt:SystemLogging><tt:FirmwareUpgrade>false</tt:FirmwareUpgrade></tt:System>\
             <tt:Security><tt:TLS1.1>false</tt:TLS1.1><tt:TLS1.2>false</tt:TLS1.2>\
             <tt:OnboardKeyGeneration>false</tt:OnboardKeyGeneration><tt:AccessPolicyConfig>false</tt:AccessPolicyConfig>\
             <tt:X.509Token>false</tt:X.509Token><tt:SAMLToken>false</tt:SAMLToken>\
             <tt:KerberosToken>false</tt:KerberosToken><tt:RELToken>false</tt:RELToken></tt:Security>\
             </tt:Device>",
            xml_escape(&services.device.xaddr),
        );

        let _ = write!(
            xml,
            "<tt:Media><tt:XAddr>{}</tt:XAddr><tt:StreamingCapabilities>\
             <tt:RTPMulticast>false</tt:RTPMulticast><tt:RTP_TCP>true</tt:RTP_TCP>\
             <tt:RTP_RTSP_TCP>true</tt:RTP_RTSP_TCP></tt:StreamingCapabilities></tt:Media>",
            xml_escape(&services.media.xaddr),
        );

        if let Some(ptz) = &services.ptz {
            let _ = write!(xml, "<tt:PTZ><tt:XAddr>{}</tt:XAddr></tt:PTZ>", xml_escape(&ptz.xaddr));
        }

        xml.push_str("</tds:Capabilities></tds:GetCapabilitiesResponse>");
        xml
    }

    fn services(&self, ctx: &HandlerContext<'_>) -> String {
        let services = ctx.store.services();
        let mut xml = format!(r#"<tds:GetServicesResponse xmlns:tds="{}">"#, DEVICE_NS);

        let endpoints: Vec<&ServiceEndpoint> = [Some(&services.device), Some(&services.media), services.ptz.as_ref()]
            .into_iter()
            .flatten()
            .collect();

        for endpoint in endpoints {
            let _ = write!(
                xml,
                "<tds:Service><tds:Namespace>{}</tds:Namespace><tds:XAddr>{}</tds:XAddr>\
                 <tds:Version><tds:Major>{}</tds:Major><tds:Minor>{}</tds:Minor></tds:Version></tds:Service>",
                xml_escape(&endpoint.namespace),
                xml_escape(&endpoint.xaddr),
                endpoint.version_major,
                endpoint.version_minor,
            );
        }

        xml.push_str("</tds:GetServicesResponse>");
        xml
    }

    fn system_date_and_time(&self, ctx: &HandlerContext<'_>) -> String {
        let now = ctx.now;
        format!(
            r#"<tds:GetSystemDateAndTimeResponse xmlns:tds="{tds}" xmlns:tt="{tt}"><tds:SystemDateAndTime><tt:DateTimeType>NTP</tt:DateTimeType><tt:DaylightSavings>false</tt:DaylightSavings><tt:TimeZone><tt:TZ>UTC</tt:TZ></tt:TimeZone><tt:UTCDateTime><tt:Time><tt:Hour>{}</tt:Hour><tt:Minute>{}</tt:Minute><tt:Second>{}</tt:Second></tt:Time><tt:Date><tt:Year>{}</tt:Year><tt:Month>{}</tt:Month><tt:Day>{}</tt:Day></tt:Date></tt:UTCDateTime></tds:SystemDateAndTime></tds:GetSystemDateAndTimeResponse>"#,
            now.hour(),
            now.minute(),
            now.second(),
            now.year(),
            now.month(),
            now.day(),
            tds = DEVICE_NS,
            tt = SCHEMA_NS,
        )
    }
}

impl ServiceHandler for DeviceService {
    fn handle(
        &self,
        operation: &str,
        _body: &str,
        ctx: &HandlerContext<'_>,
    ) -> Result<String, HandlerError> {
        match operation {
            "GetDeviceInformation" => Ok(self.device_information(ctx)),
            "GetCapabilities" => Ok(self.capabilities(ctx)),
            "GetServices" => Ok(self.services(ctx)),
            "GetSystemDateAndTime" => Ok(self.system_date_and_time(ctx)),
            other => Err(HandlerError::NotSupported(format!(
                "device service does not implement {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceInfo, ServerConfig};
    use crate::parser::element_text;
    use crate::store::DeviceStore;
    use chrono::{TimeZone, Utc};

    fn store(ptz: bool) -> DeviceStore {
        let mut config = ServerConfig::default();
        config.services.ptz_enabled = ptz;
        config.settings.advertised_host = Some("10.0.0.5".to_string());
        DeviceStore::new(&config)
    }

    fn run(store: &DeviceStore, op: &str) -> String {
        let ctx = HandlerContext {
            store,
            now: Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap(),
        };
        DeviceService.handle(op, "", &ctx).unwrap()
    }

    #[test]
    fn test_device_information() {
        let store = store(false);
        store.set_device_info(DeviceInfo {
            manufacturer: "Acme & Co".to_string(),
            hardware_id: "HW-1".to_string(),
            ..Default::default()
        });

        let xml = run(&store, "GetDeviceInformation");
        assert_eq!(element_text(&xml, "Manufacturer"), Some("Acme &amp; Co"));
        assert_eq!(element_text(&xml, "Model"), Some("ONVIF Server v1.0"));
        assert_eq!(element_text(&xml, "HardwareId"), Some("HW-1"));
    }

    #[test]
    fn test_device_information_default_hardware_id() {
        let xml = run(&store(false), "GetDeviceInformation");
        assert_eq!(element_text(&xml, "HardwareId"), Some("N/A"));
        assert_eq!(element_text(&xml, "SerialNumber"), Some("000000000001"));
    }

    #[test]
    fn test_capabilities() {
        let xml = run(&store(false), "GetCapabilities");
        assert!(xml.contains("<tt:XAddr>http://10.0.0.5:8080/onvif/device_service</tt:XAddr>"));
        assert!(xml.contains("<tt:XAddr>http://10.0.0.5:8080/onvif/media_service</tt:XAddr>"));
        assert!(!xml.contains("<tt:PTZ>"));
        assert!(xml.ends_with("</tds:Capabilities></tds:GetCapabilitiesResponse>"));

        let xml = run(&store(true), "GetCapabilities");
        assert!(xml.contains("<tt:PTZ><tt:XAddr>http://10.0.0.5:8080/onvif/ptz_service</tt:XAddr></tt:PTZ>"));
    }

    #[test]
    fn test_services() {
        let xml = run(&store(false), "GetServices");
        assert_eq!(xml.matches("<tds:Service>").count(), 2);

        let xml = run(&store(true), "GetServices");
        assert_eq!(xml.matches("<tds:Service>").count(), 3);
        assert!(xml.contains("http://www.onvif.org/ver20/ptz/wsdl"));
    }

    #[test]
    fn test_system_date_and_time() {
        let xml = run(&store(false), "GetSystemDateAndTime");
        assert_eq!(element_text(&xml, "Year"), Some("2024"));
        assert_eq!(element_text(&xml, "Month"), Some("3"));
        assert_eq!(element_text(&xml, "Day"), Some("9"));
        assert_eq!(element_text(&xml, "Hour"), Some("7"));
        assert_eq!(element_text(&xml, "Second"), Some("2"));
    }

    #[test]
    fn test_unknown_operation() {
        let store = store(false);
        let ctx = HandlerContext {
            store: &store,
            now: Utc::now(),
        };
        assert!(matches!(
            DeviceService.handle("Reboot", "", &ctx),
            Err(HandlerError::NotSupported(_))
        ));
    }
}
