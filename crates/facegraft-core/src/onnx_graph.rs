//! Just enough of the ONNX protobuf schema to read graph initializers.
//!
//! Field tags follow `onnx.proto`; every other field is skipped on decode.

use prost::Message;

/// `TensorProto.DataType.FLOAT`.
const ONNX_FLOAT: i32 = 1;

#[derive(Clone, PartialEq, Message)]
pub(crate) struct ModelProto {
    #[prost(message, optional, tag = "7")]
    pub graph: Option<GraphProto>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct GraphProto {
    #[prost(message, repeated, tag = "5")]
    pub initializer: Vec<TensorProto>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct TensorProto {
    #[prost(int64, repeated, tag = "1")]
    pub dims: Vec<i64>,
    #[prost(int32, tag = "2")]
    pub data_type: i32,
    #[prost(float, repeated, tag = "4")]
    pub float_data: Vec<f32>,
    #[prost(string, tag = "8")]
    pub name: String,
    #[prost(bytes = "vec", tag = "9")]
    pub raw_data: Vec<u8>,
}

/// The model's last initializer as a row-major `n x n` f32 matrix.
///
/// inswapper stores its latent projection there.
pub(crate) fn last_square_initializer(model: &[u8], n: usize) -> Result<Vec<f32>, String> {
    let model = ModelProto::decode(model).map_err(|e| format!("not an ONNX model: {e}"))?;
    let tensor = model
        .graph
        .and_then(|g| g.initializer.into_iter().last())
        .ok_or_else(|| "model graph has no initializers".to_string())?;

    let expected_dims = [n as i64, n as i64];
    if tensor.dims != expected_dims {
        return Err(format!(
            "last initializer '{}' has shape {:?}, expected {:?}",
            tensor.name, tensor.dims, expected_dims
        ));
    }
    if tensor.data_type != ONNX_FLOAT {
        return Err(format!(
            "last initializer '{}' has data type {}, expected float",
            tensor.name, tensor.data_type
        ));
    }

    let values: Vec<f32> = if tensor.raw_data.is_empty() {
        tensor.float_data
    } else {
        tensor
            .raw_data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    };

    if values.len() != n * n {
        return Err(format!(
            "last initializer '{}' holds {} values, expected {}",
            tensor.name,
            values.len(),
            n * n
        ));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(name: &str, dims: Vec<i64>, values: &[f32]) -> TensorProto {
        TensorProto {
            dims,
            data_type: ONNX_FLOAT,
            float_data: Vec::new(),
            name: name.to_string(),
            raw_data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn model(initializer: Vec<TensorProto>) -> Vec<u8> {
        ModelProto {
            graph: Some(GraphProto { initializer }),
        }
        .encode_to_vec()
    }

    #[test]
    fn test_reads_last_initializer_from_raw_data() {
        let matrix = [1.0, 2.0, 3.0, 4.0];
        let bytes = model(vec![
            tensor("conv.weight", vec![3], &[9.0, 9.0, 9.0]),
            tensor("emap", vec![2, 2], &matrix),
        ]);
        assert_eq!(last_square_initializer(&bytes, 2).unwrap(), matrix);
    }

    #[test]
    fn test_reads_float_data() {
        let mut t = tensor("emap", vec![2, 2], &[]);
        t.float_data = vec![0.5, -0.5, 0.25, -0.25];
        let bytes = model(vec![t]);
        assert_eq!(
            last_square_initializer(&bytes, 2).unwrap(),
            vec![0.5, -0.5, 0.25, -0.25]
        );
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let bytes = model(vec![tensor("bias", vec![4], &[0.0; 4])]);
        let err = last_square_initializer(&bytes, 2).unwrap_err();
        assert!(err.contains("'bias'"), "{err}");
    }

    #[test]
    fn test_rejects_empty_graph() {
        let bytes = model(Vec::new());
        assert!(last_square_initializer(&bytes, 2).unwrap_err().contains("no initializers"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(last_square_initializer(b"not a real model", 2).is_err());
    }
}
