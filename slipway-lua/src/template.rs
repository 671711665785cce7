//! Starter declaration written by `slipway init`

/// Template `release.lua` for a Python package with a family of images
pub const DECLARATION_TEMPLATE: &str = r#"-- Release declaration
--
-- Evaluated by slipway in a restricted Lua sandbox. The `release` and `env`
-- modules are available; see .slipway/stubs for their annotations.

local platforms = { "linux/amd64", "linux/arm64" }

return release.define {
  name = "jupyterhub",

  trigger = {
    main_branch = "main",
    paths_ignore = { "docs/**", "**.md", "**.rst", ".github/workflows/*" },
    branches_ignore = { "dependabot/**", "pre-commit-ci-update-config" },
  },

  package = {
    runtimes = { "python3", "node" },
    toolchain = {
      release.command("python3", "-m", "pip", "install", "--upgrade", "pip", "build"),
    },
    build = release.command("python3", "-m", "build", "--sdist", "--wheel", "."),
    output_dir = "dist",
    verify_sdist = release.command("./ci/check_sdist.py"),
    install_wheel = release.command("python3", "-m", "pip", "install"),
    verify_installed = release.command("./ci/check_installed_data.py"),
    isolation = {
      image = "python:3.9-slim-bullseye",
      install = release.command("pip", "install"),
    },
    artifact = { retention_days = 7 },
  },

  images = {
    default_tag = "noref",
    branch_pattern = "^main$",
    local_registry = { image = "registry:2", port = tonumber(env.get("SLIPWAY_REGISTRY_PORT", "5000")) },
    builds = {
      release.image {
        name = "base",
        repository = "jupyterhub/jupyterhub",
        platforms = platforms,
      },
      release.image {
        name = "onbuild",
        repository = "jupyterhub/jupyterhub-onbuild",
        context = "onbuild",
        platforms = platforms,
        base = { image = "base", arg = "BASE_IMAGE" },
      },
      -- the demo image's dependencies do not build on arm64
      release.image {
        name = "demo",
        repository = "jupyterhub/jupyterhub-demo",
        context = "demo-image",
        platforms = { "linux/amd64" },
        base = { image = "onbuild", arg = "BASE_IMAGE" },
      },
      release.image {
        name = "singleuser",
        repository = "jupyterhub/singleuser",
        context = "singleuser",
        platforms = platforms,
        build_args = { JUPYTERHUB_VERSION = "{version}" },
      },
    },
  },
}
"#;
