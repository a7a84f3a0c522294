// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端
// 包含: 会话构建、执行器选择、模型元数据解析

use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};
use once_cell::sync::Lazy;
use ort::{
    CUDAExecutionProvider, ExecutionProviderDispatch, GraphOptimizationLevel, Session,
    TensorRTExecutionProvider, ValueType,
};
use regex::Regex;
use tracing::{info, warn};

/// `names` 元数据形如 `{0: 'person', 1: 'bicycle'}`
static NAMES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\d+)\s*:\s*['"]([^'"]*)['"]"#).expect("valid names regex"));

/// `kpt_shape` 元数据形如 `[17, 3]`
static KPT_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*(\d+)\s*,\s*(\d+)\s*\]").expect("valid kpt_shape regex"));

/// 执行器 (Execution Provider)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

/// 模型任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YOLOTask {
    Detect,
    Pose,
}

impl YOLOTask {
    fn from_metadata(task: &str) -> Option<Self> {
        match task.trim().to_lowercase().as_str() {
            "detect" => Some(YOLOTask::Detect),
            "pose" => Some(YOLOTask::Pose),
            _ => None,
        }
    }
}

/// 后端配置
#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: String,
    pub ep: OrtEP,
    pub trt_fp16: bool,
    /// 输入尺寸 (height, width), 模型为动态尺寸时使用
    pub image_size: (u32, u32),
}

/// ONNX Runtime 会话 + 元数据
pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    height: u32,
    width: u32,
    task: Option<YOLOTask>,
    names: Option<Vec<String>>,
    nk: Option<u32>,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        let providers: Vec<ExecutionProviderDispatch> = match config.ep {
            OrtEP::CPU => Vec::new(),
            OrtEP::CUDA(device_id) => vec![CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build()],
            OrtEP::Trt(device_id) => vec![TensorRTExecutionProvider::default()
                .with_device_id(device_id)
                .with_fp16(config.trt_fp16)
                .build()],
        };

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers(providers)?
            .commit_from_file(&config.f)
            .with_context(|| format!("加载模型失败: {}", config.f))?;

        // 静态输入尺寸优先, 动态尺寸 (-1) 使用配置值
        let (mut height, mut width) = config.image_size;
        if let Some(input) = session.inputs.first() {
            if let ValueType::Tensor { dimensions, .. } = &input.input_type {
                if dimensions.len() == 4 {
                    if dimensions[2] > 0 {
                        height = dimensions[2] as u32;
                    }
                    if dimensions[3] > 0 {
                        width = dimensions[3] as u32;
                    }
                }
            }
        }

        let (task, names, nk) = match session.metadata() {
            Ok(metadata) => {
                let task = metadata
                    .custom("task")
                    .ok()
                    .flatten()
                    .and_then(|t| YOLOTask::from_metadata(&t));
                let names = metadata
                    .custom("names")
                    .ok()
                    .flatten()
                    .map(|s| parse_names(&s))
                    .filter(|names| !names.is_empty());
                let nk = metadata
                    .custom("kpt_shape")
                    .ok()
                    .flatten()
                    .and_then(|s| parse_kpt_shape(&s));
                (task, names, nk)
            }
            Err(e) => {
                warn!("⚠️ 读取模型元数据失败: {}", e);
                (None, None, None)
            }
        };

        info!(
            "✅ 模型加载成功: {} | EP: {:?} | 输入 {}x{}",
            config.f, config.ep, width, height
        );

        Ok(Self {
            session,
            ep: config.ep,
            height,
            width,
            task,
            names,
            nk,
        })
    }

    /// 前向推理, 返回全部输出张量 (按模型输出顺序)
    pub fn run(&self, xs: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>> {
        let outputs = self.session.run(ort::inputs![xs.view()]?)?;
        let mut ys = Vec::with_capacity(self.session.outputs.len());
        for output in &self.session.outputs {
            let y = outputs[output.name.as_str()].try_extract_tensor::<f32>()?;
            ys.push(y.into_owned());
        }
        Ok(ys)
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn task(&self) -> Option<YOLOTask> {
        self.task
    }

    pub fn names(&self) -> Option<&Vec<String>> {
        self.names.as_ref()
    }

    pub fn nk(&self) -> Option<u32> {
        self.nk
    }
}

/// 解析类别名称表, 缺失的id以 `class<N>` 补齐
pub fn parse_names(raw: &str) -> Vec<String> {
    let pairs: Vec<(usize, String)> = NAMES_RE
        .captures_iter(raw)
        .filter_map(|c| Some((c[1].parse::<usize>().ok()?, c[2].to_string())))
        .collect();

    let Some(max_id) = pairs.iter().map(|(id, _)| *id).max() else {
        return Vec::new();
    };

    let mut names: Vec<String> = (0..=max_id).map(|i| format!("class{}", i)).collect();
    for (id, name) in pairs {
        names[id] = name;
    }
    names
}

/// 解析关键点形状, 返回关键点数量
pub fn parse_kpt_shape(raw: &str) -> Option<u32> {
    let caps = KPT_SHAPE_RE.captures(raw)?;
    caps[1].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        let names = parse_names("{0: 'person', 1: 'bicycle', 2: \"car\"}");
        assert_eq!(names, vec!["person", "bicycle", "car"]);
    }

    #[test]
    fn test_parse_names_with_gap() {
        let names = parse_names("{0: 'person', 2: 'car'}");
        assert_eq!(names, vec!["person", "class1", "car"]);
    }

    #[test]
    fn test_parse_names_garbage() {
        assert!(parse_names("not a dict").is_empty());
    }

    #[test]
    fn test_parse_kpt_shape() {
        assert_eq!(parse_kpt_shape("[17, 3]"), Some(17));
        assert_eq!(parse_kpt_shape(""), None);
    }

    #[test]
    fn test_task_from_metadata() {
        assert_eq!(YOLOTask::from_metadata("pose"), Some(YOLOTask::Pose));
        assert_eq!(YOLOTask::from_metadata(" Detect "), Some(YOLOTask::Detect));
        assert_eq!(YOLOTask::from_metadata("segment"), None);
    }
}
