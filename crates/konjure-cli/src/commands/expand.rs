//! Expand command: parse, expand, filter and write

use clap::Args;
use std::io::Write;
use std::path::PathBuf;

use konjure_engine::{DEFAULT_DEPTH, Expander, ReaderOptions, SpecParser, StreamReader, ToolPaths};
use konjure_kube::{
    ApplicationFilter, ClearStatus, Filter, FormatFilter, ResourceMetaFilter, SelectorFilter,
    SortFilter, SortOrder, StripComments, WorkloadFilter, apply_filters,
};

use crate::error::Result;
use crate::writer::{EnvOptions, OutputFormat, Writer};

#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Specs to expand (files, directories, URLs, `-` for stdin)
    #[arg(value_name = "SPEC")]
    pub specs: Vec<String>,

    /// Maximum number of expansion iterations
    #[arg(short, long, default_value_t = DEFAULT_DEPTH)]
    pub depth: usize,

    /// Recurse into directories
    #[arg(short, long)]
    pub recurse: bool,

    /// Output format: yaml, json, env, name, columns=..., csv=..., template=...
    #[arg(short, long, default_value = "yaml")]
    pub output: String,

    /// Sort the output by source file
    #[arg(long)]
    pub sort: bool,

    /// Sort the output by kind (install or uninstall order)
    #[arg(long, value_name = "ORDER")]
    pub sort_order: Option<String>,

    /// Keep the status of resources
    #[arg(long)]
    pub keep_status: bool,

    /// Keep document comments
    #[arg(long)]
    pub keep_comments: bool,

    /// Order fields canonically
    #[arg(long)]
    pub format: bool,

    /// Label selector
    #[arg(short = 'l', long, value_name = "SELECTOR", default_value = "")]
    pub selector: String,

    /// Annotation selector
    #[arg(long, value_name = "SELECTOR", default_value = "")]
    pub annotation_selector: String,

    /// Resource group pattern
    #[arg(long, value_name = "PATTERN", default_value = "")]
    pub group: String,

    /// Resource version pattern
    #[arg(long = "resource-version", value_name = "PATTERN", default_value = "")]
    pub resource_version: String,

    /// Resource kind pattern
    #[arg(long, value_name = "PATTERN", default_value = "")]
    pub kind: String,

    /// Resource namespace pattern
    #[arg(long, value_name = "PATTERN", default_value = "")]
    pub namespace: String,

    /// Resource name pattern
    #[arg(long, value_name = "PATTERN", default_value = "")]
    pub name: String,

    /// Aggregate resources into applications
    #[arg(long)]
    pub apps: bool,

    /// Keep resources not owned by an application
    #[arg(long, requires = "apps")]
    pub show_unowned: bool,

    /// Create applications from recommended labels
    #[arg(long, requires = "apps")]
    pub scan_app_labels: bool,

    /// Only keep workloads
    #[arg(long, conflicts_with = "apps")]
    pub workloads: bool,

    /// Keep autoscalers of the workloads
    #[arg(long, requires = "workloads")]
    pub capture_autoscaling: bool,

    /// Restore blank lines between YAML documents
    #[arg(long)]
    pub vws: bool,

    /// Write `env` output for a POSIX shell
    #[arg(long)]
    pub shell: bool,

    /// Write `env` output that clears the variables
    #[arg(long)]
    pub unset: bool,

    /// Helm executable
    #[arg(long = "helm", env = "KONJURE_HELM", default_value = "helm")]
    pub helm: PathBuf,

    /// kubectl executable
    #[arg(long = "kubectl", env = "KONJURE_KUBECTL", default_value = "kubectl")]
    pub kubectl: PathBuf,

    /// Kustomize executable
    #[arg(long = "kustomize", env = "KONJURE_KUSTOMIZE", default_value = "kustomize")]
    pub kustomize: PathBuf,

    /// Git executable
    #[arg(long = "git", env = "KONJURE_GIT", default_value = "git")]
    pub git: PathBuf,

    /// Jsonnet executable
    #[arg(long = "jsonnet", env = "KONJURE_JSONNET", default_value = "jsonnet")]
    pub jsonnet: PathBuf,

    /// Jsonnet bundler executable
    #[arg(long = "jb", env = "KONJURE_JB", default_value = "jb")]
    pub jb: PathBuf,

    /// Kubeconfig for Kubernetes specs
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Kubeconfig context for Kubernetes specs
    #[arg(long)]
    pub context: Option<String>,

    /// Helm repository cache directory
    #[arg(long, env = "HELM_REPOSITORY_CACHE")]
    pub helm_repository_cache: Option<PathBuf>,
}

impl ExpandArgs {
    fn reader_options(&self) -> Result<ReaderOptions> {
        let mut options = ReaderOptions::in_dir(std::env::current_dir()?);
        options.recurse = self.recurse;
        options.tools = ToolPaths {
            git: self.git.clone(),
            helm: self.helm.clone(),
            jsonnet: self.jsonnet.clone(),
            jb: self.jb.clone(),
            kubectl: self.kubectl.clone(),
            kustomize: self.kustomize.clone(),
        };
        options.kubeconfig = self.kubeconfig.clone();
        options.kube_context = self.context.clone();
        if let Some(cache) = &self.helm_repository_cache {
            options.helm_repository_cache = Some(cache.clone());
        }
        Ok(options)
    }

    /// Filters in pipeline order
    fn filters(&self) -> Result<Vec<Box<dyn Filter>>> {
        let mut filters: Vec<Box<dyn Filter>> = Vec::new();

        let selector = SelectorFilter::new(&self.selector, &self.annotation_selector)?;
        if !selector.is_empty() {
            filters.push(Box::new(selector));
        }

        let meta = ResourceMetaFilter::new()
            .group(&self.group)?
            .version(&self.resource_version)?
            .kind(&self.kind)?
            .namespace(&self.namespace)?
            .name(&self.name)?;
        if !meta.is_empty() {
            filters.push(Box::new(meta));
        }

        if self.apps {
            filters.push(Box::new(ApplicationFilter::new(
                self.show_unowned,
                self.scan_app_labels,
            )));
        } else if self.workloads {
            filters.push(Box::new(WorkloadFilter::new(self.capture_autoscaling)));
        }

        if !self.keep_status {
            filters.push(Box::new(ClearStatus));
        }
        if !self.keep_comments {
            filters.push(Box::new(StripComments));
        }
        if self.format {
            filters.push(Box::new(FormatFilter));
        }
        if let Some(order) = &self.sort_order {
            filters.push(Box::new(SortFilter::new(order.parse::<SortOrder>()?)));
        }

        Ok(filters)
    }

    fn writer(&self) -> Result<Writer> {
        let mut writer = Writer::new(self.output.parse::<OutputFormat>()?);
        writer.sort = self.sort;
        writer.vws = self.vws;
        writer.env = EnvOptions {
            shell: self.shell,
            unset: self.unset,
        };
        Ok(writer)
    }
}

pub fn run(args: &ExpandArgs) -> Result<()> {
    // Flag problems surface before anything is read
    let filters = args.filters()?;
    let writer = args.writer()?;

    let parser = SpecParser::new().with_default_reader(|| Box::new(StreamReader::stdin()));
    let expander = Expander::new(args.reader_options()?, parser);

    let specs = if args.specs.is_empty() {
        vec!["-".to_string()]
    } else {
        args.specs.clone()
    };

    let nodes = expander.parse_specs(&specs)?;
    let nodes = expander.expand(nodes, args.depth)?;
    tracing::debug!(count = nodes.len(), "expanded resources");

    let nodes = apply_filters(&filters, nodes)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writer.write(nodes, &mut out)?;
    out.flush()?;
    Ok(())
}
