// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 完整模型实现
// 包含: 模型加载、预处理、推理、后处理 (Detect / Pose)

use anyhow::{bail, Result};
use fast_image_resize as fr;
use image::RgbImage;
use ndarray::{s, Array, Axis, IxDyn};
use tracing::debug;

use crate::detection::{BoundingBox, Detection, Keypoint};
use crate::{non_max_suppression, OrtBackend, OrtConfig, OrtEP, YOLOTask, PERSON_LABEL};

const CXYWH_OFFSET: usize = 4;
const KPT_STEP: usize = 3;
/// 默认 COCO 关键点数量
const DEFAULT_NK: usize = 17;
/// letterbox 填充灰度
const PAD_VALUE: f32 = 144.0 / 255.0;

/// YOLOv8 模型配置
#[derive(Debug, Clone)]
pub struct YOLOv8Config {
    pub model: String,
    pub ep: OrtEP,
    pub fp16: bool,
    pub width: u32,
    pub height: u32,
    pub conf: f32,
    pub kconf: f32,
    pub iou: f32,
}

/// YOLOv8 完整模型结构
pub struct YOLOv8 {
    engine: OrtBackend,
    post: YOLOv8Postprocessor,
}

impl YOLOv8 {
    /// 从配置创建 YOLOv8 模型
    pub fn new(config: YOLOv8Config) -> Result<Self> {
        let engine = OrtBackend::build(OrtConfig {
            f: config.model,
            ep: config.ep,
            trt_fp16: config.fp16,
            image_size: (config.height, config.width),
        })?;

        let post = YOLOv8Postprocessor {
            task: engine.task(),
            names: engine.names().cloned().unwrap_or_default(),
            nk: engine.nk().map(|n| n as usize),
            conf: config.conf,
            kconf: config.kconf,
            iou: config.iou,
        };

        Ok(Self { engine, post })
    }

    /// letterbox 缩放比例 (左上对齐)
    fn scale_ratio(&self, w0: u32, h0: u32) -> f32 {
        (self.engine.width() as f32 / w0 as f32).min(self.engine.height() as f32 / h0 as f32)
    }

    /// 预处理: RGB帧 → NCHW 张量 (0-1), 返回缩放比例
    pub fn preprocess(&self, frame: &RgbImage) -> Result<(Array<f32, IxDyn>, f32)> {
        let (w0, h0) = frame.dimensions();
        if w0 == 0 || h0 == 0 {
            bail!("空帧: {}x{}", w0, h0);
        }
        let (width, height) = (self.engine.width(), self.engine.height());
        let ratio = self.scale_ratio(w0, h0);
        let w_new = ((w0 as f32 * ratio).round() as u32).clamp(1, width);
        let h_new = ((h0 as f32 * ratio).round() as u32).clamp(1, height);

        let src = fr::images::ImageRef::new(w0, h0, frame.as_raw(), fr::PixelType::U8x3)?;
        let mut dst = fr::images::Image::new(w_new, h_new, fr::PixelType::U8x3);
        let mut resizer = fr::Resizer::new();
        resizer.resize(
            &src,
            &mut dst,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )?;

        let mut ys = Array::from_elem((1, 3, height as usize, width as usize), PAD_VALUE);
        for (i, rgb) in dst.buffer().chunks_exact(3).enumerate() {
            let x = i % w_new as usize;
            let y = i / w_new as usize;
            ys[[0, 0, y, x]] = rgb[0] as f32 / 255.0;
            ys[[0, 1, y, x]] = rgb[1] as f32 / 255.0;
            ys[[0, 2, y, x]] = rgb[2] as f32 / 255.0;
        }

        Ok((ys.into_dyn(), ratio))
    }

    /// 完整流程: preprocess → run → postprocess
    pub fn run(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let t_pre = std::time::Instant::now();
        let (xs, ratio) = self.preprocess(frame)?;
        let pre_ms = t_pre.elapsed().as_secs_f64() * 1000.0;

        let t_run = std::time::Instant::now();
        let ys = self.engine.run(xs)?;
        let run_ms = t_run.elapsed().as_secs_f64() * 1000.0;

        let Some(preds) = ys.first() else {
            bail!("模型没有输出");
        };
        let (w0, h0) = frame.dimensions();
        let detections = self.post.postprocess(preds, ratio, w0 as f32, h0 as f32)?;

        debug!(
            "🔍 推理: {}个目标 | 预处理 {:.1}ms | 推理 {:.1}ms",
            detections.len(),
            pre_ms,
            run_ms
        );
        Ok(detections)
    }

    pub fn names(&self) -> &[String] {
        &self.post.names
    }

    pub fn summary(&self) -> String {
        format!(
            "Task: {:?} | EP: {:?} | Input: {}x{} | classes: {} | conf: {} | iou: {}",
            self.post.task,
            self.engine.ep(),
            self.engine.width(),
            self.engine.height(),
            self.post.names.len(),
            self.post.conf,
            self.post.iou,
        )
    }
}

/// YOLOv8 后处理器 (与推理引擎解耦, 便于单独测试)
#[derive(Debug, Clone)]
pub struct YOLOv8Postprocessor {
    pub task: Option<YOLOTask>,
    pub names: Vec<String>,
    pub nk: Option<usize>,
    pub conf: f32,
    pub kconf: f32,
    pub iou: f32,
}

impl YOLOv8Postprocessor {
    /// 根据输出通道数确定 (类别数, 关键点数)
    fn layout(&self, channels: usize) -> Result<(usize, usize)> {
        if channels <= CXYWH_OFFSET {
            bail!("输出通道数异常: {}", channels);
        }
        let rest = channels - CXYWH_OFFSET;
        let (nc, nk) = match self.task {
            Some(YOLOTask::Detect) => (rest, 0),
            Some(YOLOTask::Pose) => {
                let nk = self.nk.unwrap_or(DEFAULT_NK);
                if rest <= KPT_STEP * nk {
                    bail!("姿态输出通道数异常: {} (关键点 {})", channels, nk);
                }
                (rest - KPT_STEP * nk, nk)
            }
            None => {
                let nc = self.names.len();
                if nc > 0 && rest > nc && (rest - nc) % KPT_STEP == 0 {
                    (nc, (rest - nc) / KPT_STEP)
                } else {
                    (rest, 0)
                }
            }
        };
        Ok((nc, nk))
    }

    fn label(&self, id: usize) -> String {
        match self.names.get(id) {
            Some(name) => name.clone(),
            None if id == 0 => PERSON_LABEL.to_string(),
            None => format!("class{}", id),
        }
    }

    /// 后处理: 原始输出 [1, C, N] → 原图坐标的检测结果 (已NMS, 置信度降序)
    pub fn postprocess(
        &self,
        preds: &Array<f32, IxDyn>,
        ratio: f32,
        width_original: f32,
        height_original: f32,
    ) -> Result<Vec<Detection>> {
        if preds.ndim() != 3 || preds.shape()[0] < 1 {
            bail!("输出形状异常: {:?}", preds.shape());
        }
        let anchor = preds.slice(s![0, .., ..]);
        let (nc, nk) = self.layout(anchor.shape()[0])?;

        let mut data: Vec<Detection> = Vec::new();
        for pred in anchor.axis_iter(Axis(1)) {
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);

            let Some((id, &confidence)) = clss
                .iter()
                .enumerate()
                .reduce(|max, x| if x.1 > max.1 { x } else { max })
            else {
                continue;
            };

            if confidence < self.conf {
                continue;
            }

            let y_bbox = BoundingBox::from_cxcywh(
                bbox[0] / ratio,
                bbox[1] / ratio,
                bbox[2] / ratio,
                bbox[3] / ratio,
            )
            .clamp(width_original, height_original);

            let mut detection = Detection::new(y_bbox, confidence, self.label(id));

            if nk > 0 {
                let kpts = pred.slice(s![pred.len() - KPT_STEP * nk..]);
                let keypoints = (0..nk)
                    .map(|i| {
                        let kconf = kpts[KPT_STEP * i + 2];
                        if kconf < self.kconf {
                            Keypoint::default()
                        } else {
                            Keypoint {
                                x: (kpts[KPT_STEP * i] / ratio).clamp(0.0, width_original),
                                y: (kpts[KPT_STEP * i + 1] / ratio).clamp(0.0, height_original),
                                confidence: kconf,
                            }
                        }
                    })
                    .collect();
                detection = detection.with_keypoints(keypoints);
            }

            data.push(detection);
        }

        non_max_suppression(&mut data, self.iou);
        Ok(data)
    }
}
