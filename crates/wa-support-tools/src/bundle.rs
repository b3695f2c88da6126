//! The `wa-support` template bundle, compiled into the binary

use scaffold_kit::templates::EmbeddedFiles;

macro_rules! bundle_file {
    ($path:literal, $source:literal) => {
        (
            $path,
            include_bytes!(concat!("../../../templates/wa-support/", $source)) as &[u8],
        )
    };
    ($path:literal) => {
        bundle_file!($path, $path)
    };
}

pub static WA_SUPPORT: EmbeddedFiles = &[
    bundle_file!("template.yaml"),
    bundle_file!("package.json"),
    bundle_file!("server/index.js"),
    bundle_file!("server/whatsapp.js"),
    bundle_file!("server/tickets.js"),
    bundle_file!("client/index.html"),
    bundle_file!("client/app.js"),
    bundle_file!("client/styles.css"),
    bundle_file!("client/Dockerfile"),
    bundle_file!("client/nginx.conf"),
    bundle_file!("Dockerfile"),
    bundle_file!("docker-compose.yml"),
    bundle_file!("README.md"),
    bundle_file!("gitignore"),
    bundle_file!("scripts/dev.sh"),
];
