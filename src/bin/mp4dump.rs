use anyhow::Context;
use bmffmeta::{
    Fields, FourCC, Mp4Box, ParseOptions, SampleDescription,
    known_boxes::KnownBox,
    parse_file,
    util::{hex_dump, payload_range, walk},
};
use clap::{ArgAction, Parser};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

#[derive(Parser, Debug)]
#[command(version, about = "MP4/ISOBMFF box tree explorer")]
struct Args {
    /// MP4/ISOBMFF file path
    path: String,

    /// Only print subtree(s) matching a dotted path (e.g. moov.trak[0].mdia.minf.stbl)
    #[arg(long = "filter")]
    filter: Option<String>,

    /// Dump raw payload of this 4CC (e.g. --raw stsd) or uuid:xxxxxxxx...
    #[arg(long = "raw")]
    raw: Option<String>,

    /// Limit recursion depth (for text/tree output)
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Show bytes count when dumping raw (0 means entire box payload)
    #[arg(long, default_value_t = 0)]
    bytes: usize,

    /// Only look at the first N bytes of the file
    #[arg(long)]
    size_hint: Option<u64>,

    /// Emit JSON instead of human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Debug logging on stderr
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut options = ParseOptions::default().with_fields(Fields::structure_only());
    if let Some(hint) = args.size_hint {
        options = options.with_size_hint(hint);
    }
    let out = parse_file(&args.path, &options).with_context(|| format!("parsing {}", args.path))?;
    if out.structure.is_empty() {
        tracing::warn!(path = %args.path, "no boxes found (not an ISO-BMFF file?)");
    }

    let targets: Vec<&Mp4Box> = match &args.filter {
        Some(path) => select_by_path(&out.structure, path),
        None => out.structure.iter().collect(),
    };

    // JSON mode: output JSON and exit (no tree or raw to keep output clean)
    if args.json {
        println!("{}", serde_json::to_string_pretty(&targets)?);
        return Ok(());
    }

    for b in &targets {
        print_box(b, 0, args.max_depth);
    }

    if let Some(sel) = args.raw.as_ref() {
        let mut f = File::open(&args.path)?;
        dump_raw(&mut f, &out.structure, sel, args.bytes)?;
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if verbose { "bmffmeta=debug" } else { "bmffmeta=warn" }.to_string()
    });
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();
}

// ---------- Human-readable tree ----------

fn print_box(b: &Mp4Box, depth: usize, max_depth: usize) {
    let indent = "  ".repeat(depth);
    println!(
        "{indent}{:>8} {:>10} {}{}",
        format!("{:#x}", b.offset()),
        b.box_size(),
        display_type(b),
        summary(b)
    );

    if depth + 1 > max_depth {
        return;
    }
    if let Mp4Box::StsdBox(s) = b {
        for d in &s.descriptions {
            print_sample_description(d, depth + 1, max_depth);
        }
    }
    for c in b.children() {
        print_box(c, depth + 1, max_depth);
    }
}

fn print_sample_description(d: &SampleDescription, depth: usize, max_depth: usize) {
    let indent = "  ".repeat(depth);
    let detail = match d {
        SampleDescription::MebxBox(m) => format!(" (dri={})", m.data_reference_index),
        SampleDescription::VideoEntry(v) => format!(" ({}x{}, {:?})", v.width, v.height, v.compressor_name),
        SampleDescription::AudioEntry(a) => format!(" ({} ch, {} Hz)", a.channel_count, a.sample_rate),
        SampleDescription::SampleEntry(o) => format!(" (dri={})", o.data_reference_index),
    };
    println!("{indent}{:>8} {:>10} {}{}", "", d.box_size(), d.format(), detail);
    if depth + 1 <= max_depth {
        for c in d.children() {
            print_box(c, depth + 1, max_depth);
        }
    }
}

fn display_type(b: &Mp4Box) -> String {
    match b {
        Mp4Box::RegularBox(r) if r.uuid.is_some() => {
            format!("uuid:{}", r.uuid.as_deref().unwrap_or_default())
        }
        _ => {
            let typ = b.box_type();
            match KnownBox::from(typ) {
                KnownBox::Unknown(_) => typ.to_string(),
                k => format!("{} ({})", typ, k.full_name()),
            }
        }
    }
}

fn summary(b: &Mp4Box) -> String {
    match b {
        Mp4Box::RegularBox(r) if !r.children.is_empty() => " (container)".to_string(),
        Mp4Box::RegularBox(_) => String::new(),
        Mp4Box::FtypBox(f) => format!(
            " -> {} v{} [{}]",
            f.major_brand,
            f.minor_version,
            f.compatible_brands.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(", ")
        ),
        Mp4Box::MvhdBox(m) => match m.duration_seconds {
            Some(s) => format!(" -> timescale={} duration={:.3}s", m.timescale, s),
            None => format!(" -> timescale={} duration=unknown", m.timescale),
        },
        Mp4Box::TkhdBox(t) => format!(" -> track_id={} {}x{}", t.track_id, t.width, t.height),
        Mp4Box::MdhdBox(m) => format!(" -> timescale={} language={}", m.timescale, m.language),
        Mp4Box::HdlrBox(h) => format!(" -> {} {:?}", h.handler_type, h.name),
        Mp4Box::DimensionsBox(d) => format!(" -> {}x{}", d.width, d.height),
        Mp4Box::StsdBox(s) => format!(" -> {} entries", s.number_of_entries),
    }
}

// ---------- Raw dump ----------

fn dump_raw(f: &mut File, boxes: &[Mp4Box], sel: &str, limit: usize) -> anyhow::Result<()> {
    let mut matches = Vec::new();
    walk(boxes, 0, &mut |b, _| {
        if matches_selector(b, sel) {
            matches.push(b);
        }
    });

    for (i, b) in matches.into_iter().enumerate() {
        let (off, end) = payload_range(b);
        let len = end - off;
        let to_read = if limit == 0 || limit as u64 > len { len } else { limit as u64 };

        f.seek(SeekFrom::Start(off))?;
        let mut data = vec![0u8; to_read as usize];
        f.read_exact(&mut data)?;

        println!(
            "\n== Dump {} ({}) payload: offset={:#x}, len={} ==",
            i,
            display_type(b),
            off,
            to_read
        );
        print!("{}", hex_dump(&data, off));
    }
    Ok(())
}

fn matches_selector(b: &Mp4Box, sel: &str) -> bool {
    if let Some(prefix) = sel.strip_prefix("uuid:") {
        return match b {
            Mp4Box::RegularBox(r) => r
                .uuid
                .as_deref()
                .is_some_and(|u| u.starts_with(&prefix.to_ascii_lowercase())),
            _ => false,
        };
    }
    FourCC::from_str(sel).is_some_and(|t| t == b.box_type())
}

// ---------- Filter path: moov.trak[0].mdia.minf.stbl ----------

fn select_by_path<'a>(roots: &'a [Mp4Box], path: &str) -> Vec<&'a Mp4Box> {
    let mut current: Vec<&'a Mp4Box> = Vec::new();

    for (depth, seg) in path.split('.').enumerate() {
        let (name, idx) = parse_segment(seg);
        let fourcc = FourCC::from_str(name).unwrap_or(FourCC(*b"????"));

        let candidates: Vec<&'a [Mp4Box]> = if depth == 0 {
            vec![roots]
        } else {
            current.iter().map(|b| b.children()).collect()
        };

        let mut next = Vec::new();
        for kids in candidates {
            let mut matches: Vec<&Mp4Box> = kids.iter().filter(|c| c.box_type() == fourcc).collect();
            match idx {
                Some(i) if i < matches.len() => next.push(matches[i]),
                Some(_) => {}
                None => next.append(&mut matches),
            }
        }

        current = next;
        if current.is_empty() {
            break;
        }
    }

    current
}

fn parse_segment(seg: &str) -> (&str, Option<usize>) {
    if let Some(l) = seg.find('[') {
        let name = &seg[..l];
        if let Some(r) = seg[l + 1..].find(']') {
            let idx = seg[l + 1..l + 1 + r].parse::<usize>().ok();
            return (name, idx);
        }
        (name, None)
    } else {
        (seg, None)
    }
}
