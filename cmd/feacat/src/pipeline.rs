//! Stream assembly: readers, segment selection, filters and writers.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use segstream_codec::{
    AsciiReader, AsciiWriter, CamFileReader, CamFileWriter, IlabReader, IlabWriter, TokenMap,
};
use segstream_combine::{Cut, Paste, SplitFtrs};
use segstream_core::{
    FeatureLabelSink, FeatureLabelSource, FeatureSink, FeatureSource, LabelSink, LabelSource,
    Positionable, SegmentSink, Unseekable,
};
use segstream_filter::{
    Fir, FirConfig, Narrow, Norm, NormUtts, OnlNorm, delta_kernel, load_norms,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Format, NormMode, PipelineConfig};

/// Frames moved per read.
const CHUNK_FRAMES: usize = 256;

/// Frames the feature/label split may hold for the lagging side.
const SPLIT_FRAMES: usize = 1024;

/// Path naming stdin or stdout.
const STDIO: &str = "-";

trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

type Frames = Box<dyn FeatureLabelSource>;
type Features = Box<dyn FeatureSource>;
type Labels = Box<dyn LabelSource>;

/// The stream feeding the writer.
pub enum Source {
    /// Features and labels read together.
    Joint(Frames),
    /// Filtered features beside the labels of the same frames.
    Split(Features, Labels),
    Features(Features),
    Labels(Labels),
}

impl Source {
    pub fn num_ftrs(&self) -> usize {
        match self {
            Source::Joint(s) => s.num_ftrs(),
            Source::Split(f, _) | Source::Features(f) => f.num_ftrs(),
            Source::Labels(_) => 0,
        }
    }

    pub fn num_labs(&self) -> usize {
        match self {
            Source::Joint(s) => s.num_labs(),
            Source::Split(_, l) | Source::Labels(l) => l.num_labs(),
            Source::Features(_) => 0,
        }
    }

    fn nextseg(&mut self) -> anyhow::Result<Option<usize>> {
        Ok(match self {
            Source::Joint(s) => s.nextseg()?,
            Source::Features(f) => f.nextseg()?,
            Source::Labels(l) => l.nextseg()?,
            Source::Split(f, l) => {
                let segno = f.nextseg()?;
                let labs = l.nextseg()?;
                if segno != labs {
                    bail!("feature and label views disagree: {:?} vs {:?}", segno, labs);
                }
                segno
            }
        })
    }

    /// Reads up to `count` frames; buffers must hold `count` frames.
    fn read(&mut self, count: usize, ftrs: &mut [f32], labs: &mut [u32]) -> anyhow::Result<usize> {
        Ok(match self {
            Source::Joint(s) => s.read_ftrslabs(count, Some(ftrs), Some(labs))?,
            Source::Features(f) => f.read_ftrs(count, Some(ftrs))?,
            Source::Labels(l) => l.read_labs(count, Some(labs))?,
            Source::Split(f, l) => {
                let got = f.read_ftrs(count, Some(ftrs))?;
                let got_labs = l.read_labs(count, Some(labs))?;
                if got != got_labs {
                    bail!("read {} feature frames but {} label frames", got, got_labs);
                }
                got
            }
        })
    }

    /// Skips the rest of the segment, returning the frames passed over.
    fn skip_segment(&mut self) -> anyhow::Result<usize> {
        let mut total = 0;
        loop {
            let n = match self {
                Source::Joint(s) => s.read_ftrs(CHUNK_FRAMES, None)?,
                Source::Features(f) | Source::Split(f, _) => f.read_ftrs(CHUNK_FRAMES, None)?,
                Source::Labels(l) => l.read_labs(CHUNK_FRAMES, None)?,
            };
            if n == 0 {
                return Ok(total);
            }
            total += n;
        }
    }
}

fn open_handle(path: &Path, indexed: &mut bool) -> anyhow::Result<Box<dyn ReadSeek>> {
    if path.as_os_str() == STDIO {
        if *indexed {
            warn!("stdin cannot be indexed; reading it sequentially");
            *indexed = false;
        }
        return Ok(Box::new(Unseekable::new(io::stdin().lock())));
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn load_tokmap(cfg: &PipelineConfig) -> anyhow::Result<Option<TokenMap>> {
    cfg.phoneset
        .as_ref()
        .map(|p| TokenMap::load(p).with_context(|| format!("failed to load phoneset {}", p.display())))
        .transpose()
}

fn open_frames(cfg: &PipelineConfig, path: &Path) -> anyhow::Result<Frames> {
    let mut indexed = cfg.input.indexed;
    let handle = open_handle(path, &mut indexed)?;
    let width = cfg.input.width;
    let label_only_ascii = cfg.input.format == Format::Ascii && cfg.input.labels > 0;
    if width == 0 && !label_only_ascii {
        bail!("{} input needs a feature width", format_name(cfg.input.format));
    }
    let reader: Frames = match cfg.input.format.cam() {
        Some(cam) => Box::new(
            CamFileReader::new(handle, cam, width, indexed)
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => {
            let mut r = AsciiReader::new(handle, width, cfg.input.labels);
            if let Some(map) = load_tokmap(cfg)? {
                r = r.with_tokmap(map);
            }
            Box::new(r)
        }
    };
    Ok(reader)
}

fn open_labels(cfg: &PipelineConfig, path: &Path) -> anyhow::Result<Labels> {
    let mut indexed = cfg.input.indexed;
    let handle = open_handle(path, &mut indexed)?;
    let reader = IlabReader::new(handle, indexed)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Box::new(reader))
}

fn format_name(format: Format) -> &'static str {
    match format {
        Format::Pre => "pre",
        Format::Lna8 => "lna8",
        Format::Onlftr => "onlftr",
        Format::Ascii => "ascii",
        Format::Ilab => "ilab",
    }
}

fn select<S: Positionable>(base: S, sentrange: &str) -> anyhow::Result<Cut<S>> {
    let (chosen, _) = Cut::from_ranges(base, Some(sentrange), Some("nil"))
        .with_context(|| format!("cannot select segments {:?}", sentrange))?;
    Ok(chosen)
}

/// Opens and concatenates the inputs, then applies `sentrange`.
///
/// ILab inputs give a label stream; all other formats give frames.
pub fn open(cfg: &PipelineConfig, inputs: &[PathBuf]) -> anyhow::Result<Source> {
    let Some((first, rest)) = inputs.split_first() else {
        bail!("no input files");
    };
    if cfg.input.format == Format::Ilab {
        let mut base = open_labels(cfg, first)?;
        for path in rest {
            base = Box::new(Paste::labels(base, open_labels(cfg, path)?)?);
        }
        if let Some(range) = &cfg.sentrange {
            base = Box::new(select(base, range)?);
        }
        return Ok(Source::Labels(base));
    }
    let mut base = open_frames(cfg, first)?;
    for path in rest {
        base = Box::new(Paste::frames(base, open_frames(cfg, path)?)?);
    }
    if let Some(range) = &cfg.sentrange {
        base = Box::new(select(base, range)?);
    }
    Ok(Source::Joint(base))
}

/// Applies column selection, deltas and normalization.
fn filter(mut src: Features, cfg: &PipelineConfig) -> anyhow::Result<Features> {
    if cfg.ftr_start > 0 || cfg.ftr_count.is_some() {
        src = Box::new(Narrow::new(src, cfg.ftr_start, cfg.ftr_count, CHUNK_FRAMES)?);
    }
    match cfg.delta.order {
        0 => {}
        order @ (1 | 2) => {
            let width = src.num_ftrs();
            let taps = cfg.delta.window;
            let kernel = delta_kernel(taps);
            src = Box::new(Fir::new(src, &kernel, &FirConfig::delta(taps))?);
            if order == 2 {
                // Deltas of the deltas just appended.
                let config = FirConfig::delta(taps).columns(width, width);
                src = Box::new(Fir::new(src, &kernel, &config)?);
            }
        }
        order => bail!("delta order {} is not 0, 1 or 2", order),
    }
    match cfg.norm.mode {
        NormMode::None => {}
        NormMode::File => {
            let path = cfg
                .norm
                .file
                .as_ref()
                .context("file normalization needs a norm file")?;
            let norms = load_norms(path, src.num_ftrs())
                .with_context(|| format!("failed to load norms from {}", path.display()))?;
            src = Box::new(Norm::new(src, norms)?);
        }
        NormMode::Utts => src = Box::new(NormUtts::new(src)),
        NormMode::Online => src = Box::new(OnlNorm::new(src, &cfg.norm.online)?),
    }
    Ok(src)
}

/// Label columns the output format can carry for `available` input labels.
fn output_labels(format: Format, available: usize) -> anyhow::Result<usize> {
    Ok(match format {
        Format::Pre => {
            if available > 1 {
                bail!("pre output holds one label per frame, input has {}", available);
            }
            available
        }
        Format::Lna8 | Format::Onlftr => {
            if available > 0 {
                warn!("{} output drops the labels", format_name(format));
            }
            0
        }
        Format::Ascii => available,
        Format::Ilab => {
            if available != 1 {
                bail!("ilab output needs one label per frame, input has {}", available);
            }
            1
        }
    })
}

/// Builds the stream to write: filters the features and keeps as many
/// labels as the output can take.
pub fn assemble(cfg: &PipelineConfig, source: Source) -> anyhow::Result<Source> {
    let out_labs = output_labels(cfg.output.format, source.num_labs())?;
    let frames = match source {
        Source::Joint(frames) => frames,
        Source::Labels(labs) => {
            if cfg.filters_features() {
                bail!("feature options need a feature input");
            }
            if !matches!(cfg.output.format, Format::Ilab | Format::Ascii) {
                bail!("label input can only be written as ilab or ascii");
            }
            return Ok(Source::Labels(labs));
        }
        other => return Ok(other),
    };
    if cfg.output.format == Format::Ilab {
        if cfg.filters_features() {
            warn!("ilab output carries no features; feature options ignored");
        }
        return Ok(Source::Labels(Box::new(frames)));
    }
    if out_labs == 0 {
        return Ok(Source::Features(filter(Box::new(frames), cfg)?));
    }
    if !cfg.filters_features() {
        return Ok(Source::Joint(frames));
    }
    if frames.num_segs()?.is_none() {
        warn!("input is not indexed; labels dropped so features can be filtered");
        return Ok(Source::Features(filter(Box::new(frames), cfg)?));
    }
    let (ftrs, labs) = SplitFtrs::new(frames, SPLIT_FRAMES)?;
    Ok(Source::Split(filter(Box::new(ftrs), cfg)?, Box::new(labs)))
}

/// Destination of converted frames.
enum Sink {
    Cam(CamFileWriter<Box<dyn Write>>),
    Ascii(AsciiWriter<Box<dyn Write>>),
    Ilab(IlabWriter<BufWriter<File>>),
}

fn create_writer(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    match path {
        Some(p) if p.as_os_str() != STDIO => {
            let file =
                File::create(p).with_context(|| format!("failed to create {}", p.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        _ => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

impl Sink {
    fn create(
        cfg: &PipelineConfig,
        path: Option<&Path>,
        n_ftrs: usize,
        n_labs: usize,
    ) -> anyhow::Result<Self> {
        let format = cfg.output.format;
        if let Some(cam) = format.cam() {
            let w = CamFileWriter::new(create_writer(path)?, cam, n_ftrs).online(cfg.output.online);
            return Ok(Sink::Cam(w));
        }
        if format == Format::Ilab {
            let Some(p) = path.filter(|p| p.as_os_str() != STDIO) else {
                bail!("ilab output must go to a file");
            };
            let file =
                File::create(p).with_context(|| format!("failed to create {}", p.display()))?;
            let w = IlabWriter::new(BufWriter::new(file), cfg.output.max_label, true)?;
            return Ok(Sink::Ilab(w));
        }
        let mut w = AsciiWriter::new(create_writer(path)?, n_ftrs, n_labs);
        if let Some(map) = load_tokmap(cfg)? {
            w = w.with_tokmap(map);
        }
        Ok(Sink::Ascii(w))
    }

    fn write(&mut self, count: usize, ftrs: &[f32], labs: &[u32]) -> anyhow::Result<()> {
        match self {
            Sink::Cam(w) => {
                if labs.is_empty() {
                    w.write_ftrs(count, ftrs)?
                } else {
                    w.write_ftrslabs(count, ftrs, labs)?
                }
            }
            Sink::Ascii(w) => match (ftrs.is_empty(), labs.is_empty()) {
                (false, false) => w.write_ftrslabs(count, ftrs, labs)?,
                (true, false) => w.write_labs(count, labs)?,
                _ => w.write_ftrs(count, ftrs)?,
            },
            Sink::Ilab(w) => w.write_labs(count, labs)?,
        }
        Ok(())
    }

    fn doneseg(&mut self) -> anyhow::Result<()> {
        match self {
            Sink::Cam(w) => w.doneseg()?,
            Sink::Ascii(w) => w.doneseg()?,
            Sink::Ilab(w) => w.doneseg()?,
        }
        Ok(())
    }

    fn finish(self) -> anyhow::Result<()> {
        match self {
            Sink::Cam(w) => w.finish()?.flush()?,
            Sink::Ascii(w) => w.finish()?.flush()?,
            Sink::Ilab(w) => w.finish()?.flush()?,
        }
        Ok(())
    }
}

/// Totals of a finished conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub segments: usize,
    pub frames: usize,
    pub num_ftrs: usize,
    pub num_labs: usize,
}

/// Runs the whole pipeline from `inputs` to `output` (stdout when `None`).
pub fn convert(
    cfg: &PipelineConfig,
    inputs: &[PathBuf],
    output: Option<&Path>,
) -> anyhow::Result<Summary> {
    let mut source = assemble(cfg, open(cfg, inputs)?)?;
    let (nf, nl) = (source.num_ftrs(), source.num_labs());
    info!(
        "writing {} output: {} features, {} labels",
        format_name(cfg.output.format),
        nf,
        nl
    );
    let mut sink = Sink::create(cfg, output, nf, nl)?;
    let mut ftrs = vec![0.0f32; CHUNK_FRAMES * nf];
    let mut labs = vec![0u32; CHUNK_FRAMES * nl];
    let mut summary = Summary {
        segments: 0,
        frames: 0,
        num_ftrs: nf,
        num_labs: nl,
    };
    while let Some(segno) = source.nextseg()? {
        let mut frames = 0;
        loop {
            let n = source
                .read(CHUNK_FRAMES, &mut ftrs, &mut labs)
                .with_context(|| format!("failed reading segment {}", segno))?;
            if n == 0 {
                break;
            }
            sink.write(n, &ftrs[..n * nf], &labs[..n * nl])?;
            frames += n;
        }
        if frames == 0 {
            warn!("segment {} is empty; not written", segno);
            continue;
        }
        sink.doneseg()?;
        debug!("copied segment {}: {} frames", segno, frames);
        summary.segments += 1;
        summary.frames += frames;
    }
    sink.finish()?;
    info!(
        "wrote {} segments, {} frames",
        summary.segments, summary.frames
    );
    Ok(summary)
}

/// Shape of an input stream, as reported by `feacat info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub format: Format,
    pub num_ftrs: usize,
    pub num_labs: usize,
    /// Segment count from the index, when the input has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_segs: Option<usize>,
    pub num_segs: usize,
    pub num_frames: usize,
    /// Frames of each segment.
    pub segments: Vec<usize>,
}

/// Walks the selected segments of the inputs and counts their frames.
pub fn describe(cfg: &PipelineConfig, inputs: &[PathBuf]) -> anyhow::Result<StreamInfo> {
    let mut source = open(cfg, inputs)?;
    let indexed_segs = match &source {
        Source::Joint(s) => s.num_segs()?,
        Source::Labels(l) => l.num_segs()?,
        Source::Features(f) | Source::Split(f, _) => f.num_segs()?,
    };
    let mut segments = Vec::new();
    while source.nextseg()?.is_some() {
        segments.push(source.skip_segment()?);
    }
    Ok(StreamInfo {
        format: cfg.input.format,
        num_ftrs: source.num_ftrs(),
        num_labs: source.num_labs(),
        indexed_segs,
        num_segs: segments.len(),
        num_frames: segments.iter().sum(),
        segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeltaConfig, InputConfig, OutputConfig};
    use tempfile::TempDir;

    /// Writes a pre file with one feature and one label per frame.
    fn write_pre(dir: &TempDir, name: &str, segs: &[&[(f32, u32)]]) -> PathBuf {
        let path = dir.path().join(name);
        let file = File::create(&path).unwrap();
        let mut w = CamFileWriter::pre(BufWriter::new(file), 1);
        for seg in segs {
            let ftrs: Vec<f32> = seg.iter().map(|f| f.0).collect();
            let labs: Vec<u32> = seg.iter().map(|f| f.1).collect();
            w.write_ftrslabs(seg.len(), &ftrs, &labs).unwrap();
            w.doneseg().unwrap();
        }
        w.finish().unwrap().flush().unwrap();
        path
    }

    fn write_onlftr(dir: &TempDir, name: &str, width: usize, segs: &[&[f32]]) -> PathBuf {
        let path = dir.path().join(name);
        let file = File::create(&path).unwrap();
        let mut w = CamFileWriter::onlftr(BufWriter::new(file), width);
        for seg in segs {
            w.write_ftrs(seg.len() / width, seg).unwrap();
            w.doneseg().unwrap();
        }
        w.finish().unwrap().flush().unwrap();
        path
    }

    fn config(format: Format, width: usize, out: Format) -> PipelineConfig {
        PipelineConfig {
            input: InputConfig {
                format,
                width,
                ..Default::default()
            },
            output: OutputConfig {
                format: out,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn test_pre_to_ascii_keeps_labels() {
        let dir = TempDir::new().unwrap();
        let input = write_pre(&dir, "in.pre", &[&[(0.0, 3), (0.0, 4)], &[(0.0, 5)]]);
        let out = dir.path().join("out.txt");
        let cfg = config(Format::Pre, 1, Format::Ascii);
        let summary = convert(&cfg, &[input], Some(&out)).unwrap();
        assert_eq!(summary.segments, 2);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.num_labs, 1);
        // Pre features are quantized, so only positions and labels are exact.
        let kept: Vec<String> = lines(&out)
            .iter()
            .map(|l| {
                let t: Vec<&str> = l.split(' ').collect();
                format!("{} {} {}", t[0], t[1], t[3])
            })
            .collect();
        assert_eq!(kept, vec!["0 0 3", "0 1 4", "1 0 5"]);
    }

    #[test]
    fn test_sentrange_and_paste() {
        let dir = TempDir::new().unwrap();
        let a = write_onlftr(&dir, "a.onl", 1, &[&[1.0], &[2.0, 2.5]]);
        let b = write_onlftr(&dir, "b.onl", 1, &[&[3.0], &[4.0]]);
        let out = dir.path().join("out.txt");
        let mut cfg = config(Format::Onlftr, 1, Format::Ascii);
        cfg.sentrange = Some("3,1".into());
        convert(&cfg, &[a, b], Some(&out)).unwrap();
        assert_eq!(lines(&out), vec!["0 0 4", "1 0 2", "1 1 2.5"]);
    }

    #[test]
    fn test_narrow_and_deltas() {
        let dir = TempDir::new().unwrap();
        // Column 0 ramps, column 1 is noise to drop.
        let input = write_onlftr(&dir, "in.onl", 2, &[&[0.0, 9.0, 1.0, 9.0, 2.0, 9.0]]);
        let out = dir.path().join("out.onl");
        let mut cfg = config(Format::Onlftr, 2, Format::Onlftr);
        cfg.ftr_count = Some(1);
        cfg.delta = DeltaConfig { order: 2, window: 3 };
        let summary = convert(&cfg, &[input], Some(&out)).unwrap();
        assert_eq!(summary.num_ftrs, 3);

        let file = BufReader::new(File::open(&out).unwrap());
        let mut r = CamFileReader::onlftr(file, 3, true).unwrap();
        r.nextseg().unwrap();
        let mut got = [0.0; 9];
        assert_eq!(r.read_ftrs(3, Some(&mut got)).unwrap(), 3);
        // Edge frames repeat: deltas 1, 2, 1 and their deltas 1, 0, -1.
        assert_eq!(got, [0.0, 1.0, 1.0, 1.0, 2.0, 0.0, 2.0, 1.0, -1.0]);
    }

    #[test]
    fn test_filtered_features_keep_labels() {
        let dir = TempDir::new().unwrap();
        let input = write_pre(&dir, "in.pre", &[&[(0.0, 1), (0.0, 2), (0.0, 3)]]);
        let out = dir.path().join("out.txt");
        let mut cfg = config(Format::Pre, 1, Format::Ascii);
        cfg.norm.mode = NormMode::Online;
        let summary = convert(&cfg, &[input], Some(&out)).unwrap();
        assert_eq!(summary.num_labs, 1);
        let labels: Vec<String> = lines(&out)
            .iter()
            .map(|l| l.rsplit(' ').next().unwrap().to_owned())
            .collect();
        assert_eq!(labels, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_labels_to_ilab_and_back() {
        let dir = TempDir::new().unwrap();
        let input = write_pre(&dir, "in.pre", &[&[(0.0, 7), (0.0, 7)], &[(0.0, 9)]]);
        let ilab = dir.path().join("out.ilab");
        convert(&config(Format::Pre, 1, Format::Ilab), &[input], Some(&ilab)).unwrap();

        let info = describe(&config(Format::Ilab, 0, Format::Ascii), &[ilab.clone()]).unwrap();
        assert_eq!(info.indexed_segs, Some(2));
        assert_eq!(info.segments, vec![2, 1]);
        assert_eq!(info.num_labs, 1);

        let out = dir.path().join("labels.txt");
        convert(&config(Format::Ilab, 0, Format::Ascii), &[ilab], Some(&out)).unwrap();
        assert_eq!(lines(&out), vec!["0 0 7", "0 1 7", "1 0 9"]);
    }

    #[test]
    fn test_describe_counts_frames() {
        let dir = TempDir::new().unwrap();
        let input = write_onlftr(&dir, "in.onl", 2, &[&[0.0; 6], &[0.0; 2], &[0.0; 8]]);
        let mut cfg = config(Format::Onlftr, 2, Format::Ascii);
        let info = describe(&cfg, &[input.clone()]).unwrap();
        assert_eq!(info.num_ftrs, 2);
        assert_eq!(info.segments, vec![3, 1, 4]);
        assert_eq!(info.num_frames, 8);

        cfg.input.indexed = false;
        let info = describe(&cfg, &[input]).unwrap();
        assert_eq!(info.indexed_segs, None);
        assert_eq!(info.num_segs, 3);
    }

    #[test]
    fn test_bad_requests() {
        let dir = TempDir::new().unwrap();
        let input = write_onlftr(&dir, "in.onl", 1, &[&[1.0]]);
        let mut cfg = config(Format::Onlftr, 0, Format::Ascii);
        assert!(convert(&cfg, &[input.clone()], None).is_err());
        cfg.input.width = 1;
        cfg.delta.order = 3;
        assert!(convert(&cfg, &[input.clone()], Some(&dir.path().join("x"))).is_err());
        cfg.delta.order = 0;
        cfg.sentrange = Some("5".into());
        assert!(describe(&cfg, &[input]).is_err());
        assert!(open(&cfg, &[]).is_err());
    }
}
