/*!
 * Proxy Route Rendering
 * Registry -> reverse-proxy server blocks
 */

use crate::registry::Registry;
use crate::service::ProxyRoute;
use std::fmt::Write;

/// Proxy routes of every exposed application, in name order
pub fn routes(registry: &Registry) -> Vec<&ProxyRoute> {
    registry.iter().filter_map(|d| d.proxy_route()).collect()
}

/// Render the reverse-proxy table for a registry
///
/// One server block per exposed application; static assets are served
/// directly, everything else is forwarded upstream.
pub fn proxy_routes(registry: &Registry) -> String {
    let mut out = String::new();
    for route in routes(registry) {
        if !out.is_empty() {
            out.push('\n');
        }
        server_block(&mut out, route);
    }
    out
}

fn server_block(out: &mut String, route: &ProxyRoute) {
    let _ = writeln!(out, "server {{");
    let _ = writeln!(out, "    server_name {};", route.host_name);
    let _ = writeln!(out, "    location {} {{", route.static_prefix);
    let _ = writeln!(out, "        alias {}/;", route.static_root.display());
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "    location / {{");
    let _ = writeln!(out, "        proxy_set_header Host $host;");
    let _ = writeln!(out, "        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;");
    let _ = writeln!(out, "        proxy_set_header X-Forwarded-Proto $scheme;");
    let _ = writeln!(out, "        proxy_pass {};", route.upstream_url());
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{RawApplicationSpec, Validator};
    use crate::network::resolve;
    use crate::secrets::StagedSecret;
    use crate::service::{build, BuildContext};
    use std::path::PathBuf;

    fn registry(apps: &[(&str, bool)]) -> Registry {
        let mut validator = Validator::new("/run/appstage");
        let descriptors = apps.iter().map(|(name, exposed)| {
            let raw = RawApplicationSpec {
                name: name.to_string(),
                root: Some(PathBuf::from(format!("/srv/{}", name))),
                module_entry_point: Some(format!("{}.wsgi", name)),
                database_name: Some(name.to_string()),
                secrets_file: Some(PathBuf::from(format!("/etc/secrets/{}.env", name))),
                host_name: Some(format!("{}.example.com", name)),
                allowed_hosts: vec![format!("{}.example.com", name)],
                expose_via_proxy: *exposed,
                ..Default::default()
            };
            let spec = validator.validate(&raw).unwrap();
            let secret = StagedSecret::new(
                name.to_string(),
                PathBuf::from(format!("/var/lib/appstage/secrets/{}/secrets.env", name)),
                "00".repeat(32),
                0o400,
            );
            build(&spec, &secret, &resolve(&spec), &BuildContext::default()).unwrap()
        });
        Registry::from_descriptors(descriptors.collect::<Vec<_>>())
    }

    #[test]
    fn test_only_exposed_apps_routed() {
        let registry = registry(&[("blog", true), ("internal", false), ("shop", true)]);
        let hosts: Vec<_> = routes(&registry).iter().map(|r| r.host_name.as_str()).collect();
        assert_eq!(hosts, vec!["blog.example.com", "shop.example.com"]);
    }

    #[test]
    fn test_server_block() {
        let text = proxy_routes(&registry(&[("blog", true)]));
        assert!(text.contains("server_name blog.example.com;"));
        assert!(text.contains("location /static/ {"));
        assert!(text.contains("alias /srv/blog/static/;"));
        assert!(text.contains("proxy_pass http://unix:/run/appstage/blog/blog.sock:;"));
    }

    #[test]
    fn test_empty_registry() {
        assert_eq!(proxy_routes(&Registry::default()), "");
    }
}
